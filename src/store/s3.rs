use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::{ByteStream, DateTimeFormat};
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl, ObjectOwnership,
};
use aws_sdk_s3::Client;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::S3Config;
use crate::error::StoreError;
use crate::store::operator::ObjectHeaders;
use crate::store::{Bucket, Connection, ObjectStore, RemoteObject, Upload, Visibility};

/// Region whose buckets are created without a location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// S3-compatible storage providers
#[derive(Debug, Clone, PartialEq)]
pub enum S3Provider {
    Aws,
    DigitalOcean,
    Hetzner,
    MinIO,
    CloudflareR2,
    Wasabi,
    Custom { endpoint: String },
}

impl S3Provider {
    /// Parse a provider name as written in the config file.
    pub fn parse(name: &str, endpoint: Option<&str>) -> Result<Self, StoreError> {
        if let Some(endpoint) = endpoint {
            return Ok(S3Provider::Custom {
                endpoint: endpoint.to_string(),
            });
        }
        match name.to_ascii_lowercase().as_str() {
            "aws" | "" => Ok(S3Provider::Aws),
            "digitalocean" | "do" => Ok(S3Provider::DigitalOcean),
            "hetzner" => Ok(S3Provider::Hetzner),
            "minio" => Ok(S3Provider::MinIO),
            "r2" | "cloudflare" => Ok(S3Provider::CloudflareR2),
            "wasabi" => Ok(S3Provider::Wasabi),
            other => Err(StoreError::Connection(format!(
                "unknown S3 provider `{}`; set an endpoint for custom providers",
                other
            ))),
        }
    }

    /// Get the endpoint URL for this provider
    pub fn endpoint(&self, region: &str) -> Option<String> {
        match self {
            S3Provider::Aws => None, // Use default AWS endpoint
            S3Provider::DigitalOcean => Some(format!("https://{}.digitaloceanspaces.com", region)),
            S3Provider::Hetzner => Some(format!("https://{}.your-objectstorage.com", region)),
            S3Provider::MinIO => Some("http://localhost:9000".to_string()),
            S3Provider::CloudflareR2 => Some(format!("https://{}.r2.cloudflarestorage.com", region)),
            S3Provider::Wasabi => Some(format!("https://s3.{}.wasabisys.com", region)),
            S3Provider::Custom { endpoint } => Some(endpoint.clone()),
        }
    }

    /// Self-hosted servers usually lack virtual-host bucket routing.
    pub fn path_style(&self) -> bool {
        matches!(self, S3Provider::MinIO | S3Provider::Custom { .. })
    }
}

/// Location constraint for a new bucket. `us-east-1` takes none.
pub fn location_constraint(region: &str) -> Option<CreateBucketConfiguration> {
    if region.is_empty() || region == DEFAULT_REGION {
        return None;
    }
    Some(
        CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(region))
            .build(),
    )
}

fn canned_acl(visibility: Visibility) -> ObjectCannedAcl {
    match visibility {
        Visibility::PublicRead => ObjectCannedAcl::PublicRead,
    }
}

fn describe<E: std::error::Error>(err: &E) -> String {
    DisplayErrorContext(err).to_string()
}

/// S3 and S3-compatible object store using the AWS SDK
pub struct S3Store {
    config: S3Config,
    provider: S3Provider,
}

impl S3Store {
    pub fn from_config(config: &S3Config) -> Result<Self, StoreError> {
        let provider = S3Provider::parse(&config.provider, config.endpoint.as_deref())?;
        Ok(Self {
            config: config.clone(),
            provider,
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn connect(&self) -> Result<Box<dyn Connection>, StoreError> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()));

        // Without explicit keys the SDK walks the AWS credential chain
        match (&self.config.access_key_id, &self.config.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                loader = loader.credentials_provider(Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    "collectr",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(StoreError::Connection(
                    "access_key_id and secret_access_key must be set together".to_string(),
                ));
            }
        }
        if let Some(endpoint) = self.provider.endpoint(&self.config.region) {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.provider.path_style())
            .build();

        Ok(Box::new(S3Connection {
            client: Client::from_conf(s3_config),
            region: self.config.region.clone(),
        }))
    }

    fn kind(&self) -> &'static str {
        "s3"
    }
}

pub struct S3Connection {
    client: Client,
    region: String,
}

impl S3Connection {
    fn bucket(&self, name: &str) -> Arc<dyn Bucket> {
        Arc::new(S3Bucket {
            client: self.client.clone(),
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl Connection for S3Connection {
    async fn get_bucket(&self, name: &str) -> Result<Option<Arc<dyn Bucket>>, StoreError> {
        match self.client.head_bucket().bucket(name).send().await {
            Ok(_) => {
                debug!(bucket = name, "bucket found");
                Ok(Some(self.bucket(name)))
            }
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(None),
            Err(e) => Err(StoreError::BucketLookup {
                bucket: name.to_string(),
                reason: describe(&e),
            }),
        }
    }

    async fn create_bucket(&self, name: &str) -> Result<Arc<dyn Bucket>, StoreError> {
        // Object ACLs are disabled on new buckets unless the writer owns objects
        self.client
            .create_bucket()
            .bucket(name)
            .object_ownership(ObjectOwnership::ObjectWriter)
            .set_create_bucket_configuration(location_constraint(&self.region))
            .send()
            .await
            .map_err(|e| StoreError::BucketCreate {
                bucket: name.to_string(),
                reason: describe(&e),
            })?;

        // New AWS buckets block public ACLs by default
        if let Err(e) = self
            .client
            .delete_public_access_block()
            .bucket(name)
            .send()
            .await
        {
            warn!(
                bucket = name,
                code = e.code().unwrap_or("unknown"),
                "could not lift the public access block; public-read uploads may be rejected"
            );
        }
        Ok(self.bucket(name))
    }
}

/// A bucket reached through the AWS SDK.
pub struct S3Bucket {
    client: Client,
    name: String,
}

#[async_trait]
impl Bucket for S3Bucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, key: &str) -> Result<Option<RemoteObject>, StoreError> {
        match self.client.head_object().bucket(&self.name).key(key).send().await {
            Ok(head) => Ok(Some(RemoteObject {
                key: key.to_string(),
                last_modified: head
                    .last_modified()
                    .and_then(|ts| ts.fmt(DateTimeFormat::HttpDate).ok()),
            })),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(None),
            Err(e) => Err(StoreError::object(key, describe(&e))),
        }
    }

    async fn put(&self, upload: Upload) -> Result<(), StoreError> {
        let Upload {
            key,
            body,
            metadata,
            visibility,
        } = upload;
        let headers = ObjectHeaders::from_metadata(&metadata);

        self.client
            .put_object()
            .bucket(&self.name)
            .key(&key)
            .body(ByteStream::from(body))
            .acl(canned_acl(visibility))
            .set_cache_control(headers.cache_control)
            .set_content_type(headers.content_type)
            .set_content_disposition(headers.content_disposition)
            .set_content_encoding(headers.content_encoding)
            .set_metadata((!headers.user.is_empty()).then_some(headers.user))
            .send()
            .await
            .map_err(|e| StoreError::object(&key, describe(&e)))?;

        debug!(key = %key, acl = visibility.as_acl(), "object written");
        Ok(())
    }
}
