use async_trait::async_trait;
use opendal::{ErrorKind, Operator};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::{Bucket, RemoteObject, Upload, Visibility};

/// Metadata split into object headers and free-form user metadata.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ObjectHeaders {
    pub cache_control: Option<String>,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub user: HashMap<String, String>,
}

impl ObjectHeaders {
    /// Well-known header names are matched case-insensitively; every other
    /// key becomes user metadata.
    pub fn from_metadata(metadata: &BTreeMap<String, String>) -> Self {
        let mut headers = Self::default();
        for (key, value) in metadata {
            let slot = match key.to_ascii_lowercase().as_str() {
                "cache-control" => &mut headers.cache_control,
                "content-type" => &mut headers.content_type,
                "content-disposition" => &mut headers.content_disposition,
                "content-encoding" => &mut headers.content_encoding,
                _ => {
                    headers.user.insert(key.clone(), value.clone());
                    continue;
                }
            };
            *slot = Some(value.clone());
        }
        headers
    }
}

/// A bucket backed by an OpenDAL operator rooted at the bucket.
pub struct OperatorBucket {
    name: String,
    operator: Operator,
    backend: &'static str,
}

impl OperatorBucket {
    pub fn new(name: &str, operator: Operator, backend: &'static str) -> Self {
        Self {
            name: name.to_string(),
            operator,
            backend,
        }
    }
}

#[async_trait]
impl Bucket for OperatorBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, key: &str) -> Result<Option<RemoteObject>, StoreError> {
        match self.operator.stat(key).await {
            Ok(meta) => Ok(Some(RemoteObject {
                key: key.to_string(),
                last_modified: meta.last_modified().map(|t| t.to_string()),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::object(key, e)),
        }
    }

    async fn put(&self, upload: Upload) -> Result<(), StoreError> {
        let Upload {
            key,
            body,
            metadata,
            visibility,
        } = upload;
        let capability = self.operator.info().full_capability();
        let headers = ObjectHeaders::from_metadata(&metadata);
        let mut dropped = Vec::new();

        let mut write = self.operator.write_with(&key, body);
        if let Some(value) = headers.cache_control.as_deref() {
            if capability.write_with_cache_control {
                write = write.cache_control(value);
            } else {
                dropped.push("Cache-Control");
            }
        }
        if let Some(value) = headers.content_type.as_deref() {
            if capability.write_with_content_type {
                write = write.content_type(value);
            } else {
                dropped.push("Content-Type");
            }
        }
        if let Some(value) = headers.content_disposition.as_deref() {
            if capability.write_with_content_disposition {
                write = write.content_disposition(value);
            } else {
                dropped.push("Content-Disposition");
            }
        }
        if let Some(value) = headers.content_encoding.as_deref() {
            if capability.write_with_content_encoding {
                write = write.content_encoding(value);
            } else {
                dropped.push("Content-Encoding");
            }
        }
        if !headers.user.is_empty() {
            if capability.write_with_user_metadata {
                write = write.user_metadata(headers.user);
            } else {
                dropped.push("user metadata");
            }
        }

        write.await.map_err(|e| StoreError::object(&key, e))?;

        if !dropped.is_empty() {
            warn!(
                key = %key,
                backend = self.backend,
                "backend cannot store {}; dropped",
                dropped.join(", ")
            );
        }
        // No per-object ACL; directory files are readable per their mode
        debug!(key = %key, acl = visibility.as_acl(), "object written");
        Ok(())
    }
}
