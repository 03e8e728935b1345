use async_trait::async_trait;
use opendal::{services::Fs, Operator};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::StoreError;
use crate::store::operator::OperatorBucket;
use crate::store::{Bucket, Connection, ObjectStore};

/// Object store on the local filesystem; each bucket is a directory under
/// `root`. Handy for staging a publish tree or serving it from disk.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn connect(&self) -> Result<Box<dyn Connection>, StoreError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(Box::new(LocalConnection {
                root: self.root.clone(),
            })),
            Ok(_) => Err(StoreError::Connection(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(e) => Err(StoreError::Connection(format!(
                "{}: {}",
                self.root.display(),
                e
            ))),
        }
    }

    fn kind(&self) -> &'static str {
        "fs"
    }
}

pub struct LocalConnection {
    root: PathBuf,
}

impl LocalConnection {
    fn bucket(&self, name: &str) -> Result<Arc<dyn Bucket>, StoreError> {
        let dir = self.root.join(name);
        let builder = Fs::default().root(&dir.to_string_lossy());
        let operator = Operator::new(builder)
            .map(|op| op.finish())
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Arc::new(OperatorBucket::new(name, operator, "fs")))
    }
}

#[async_trait]
impl Connection for LocalConnection {
    async fn get_bucket(&self, name: &str) -> Result<Option<Arc<dyn Bucket>>, StoreError> {
        match tokio::fs::metadata(self.root.join(name)).await {
            Ok(meta) if meta.is_dir() => self.bucket(name).map(Some),
            Ok(_) => Err(StoreError::BucketLookup {
                bucket: name.to_string(),
                reason: "exists but is not a directory".to_string(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::BucketLookup {
                bucket: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn create_bucket(&self, name: &str) -> Result<Arc<dyn Bucket>, StoreError> {
        tokio::fs::create_dir_all(self.root.join(name))
            .await
            .map_err(|e| StoreError::BucketCreate {
                bucket: name.to_string(),
                reason: e.to_string(),
            })?;
        self.bucket(name)
    }
}
