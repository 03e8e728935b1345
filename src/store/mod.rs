//! Object-store collaborator.
//!
//! A sync only needs a narrow slice of an object store: connect, find or
//! create one bucket, look objects up by key and write them. The traits
//! here describe that slice. [`s3`] implements it with the AWS SDK,
//! [`local`] with OpenDAL over a directory, and [`memory`] in-process.

pub mod local;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod operator;
pub mod s3;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::StoreError;

pub use local::LocalStore;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use s3::{S3Bucket, S3Provider, S3Store};

/// Access level applied to published objects.
///
/// Everything collectr publishes is world-readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Visibility {
    #[default]
    PublicRead,
}

impl Visibility {
    /// Canned ACL name.
    pub fn as_acl(&self) -> &'static str {
        match self {
            Visibility::PublicRead => "public-read",
        }
    }
}

/// An object as seen by a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    /// Last-modified time in the store's wire format.
    pub last_modified: Option<String>,
}

/// Everything written for a single object.
#[derive(Debug, Clone)]
pub struct Upload {
    pub key: String,
    pub body: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
    pub visibility: Visibility,
}

/// Entry point to a store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Establish a connection.
    async fn connect(&self) -> Result<Box<dyn Connection>, StoreError>;

    /// Short backend name for logs.
    fn kind(&self) -> &'static str;
}

/// An open connection to a store.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Fetch a bucket. `Ok(None)` means the bucket is confirmed absent.
    async fn get_bucket(&self, name: &str) -> Result<Option<Arc<dyn Bucket>>, StoreError>;

    /// Create a bucket.
    async fn create_bucket(&self, name: &str) -> Result<Arc<dyn Bucket>, StoreError>;
}

/// A single bucket.
#[async_trait]
pub trait Bucket: Send + Sync {
    fn name(&self) -> &str;

    /// Find an object by key. `Ok(None)` when the key does not exist.
    async fn lookup(&self, key: &str) -> Result<Option<RemoteObject>, StoreError>;

    /// Write the body, metadata and visibility of one object.
    async fn put(&self, upload: Upload) -> Result<(), StoreError>;
}

/// Build the store described by `config`.
pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    match config {
        StoreConfig::S3(s3) => Ok(Arc::new(S3Store::from_config(s3)?)),
        StoreConfig::Fs(fs) => Ok(Arc::new(LocalStore::new(&fs.root))),
    }
}
