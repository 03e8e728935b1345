//! In-process object store.
//!
//! Keeps buckets and objects in memory and lets callers pin timestamps and
//! inject failures. Used to exercise the sync engine without a network.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;
use crate::store::{Bucket, Connection, ObjectStore, RemoteObject, Upload, Visibility};

/// RFC 1123 format, as returned in `Last-Modified` headers.
pub const RFC1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An object held by [`MemoryBucket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
    pub visibility: Visibility,
    pub last_modified: DateTime<Utc>,
}

#[derive(Default)]
struct StoreState {
    buckets: HashMap<String, Arc<MemoryBucket>>,
    lookup_failure: Option<String>,
}

/// In-memory [`ObjectStore`]. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    connections: Arc<AtomicUsize>,
    buckets_created: Arc<AtomicUsize>,
    refuse_connections: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `connect` always fails.
    pub fn unreachable() -> Self {
        Self {
            refuse_connections: true,
            ..Self::default()
        }
    }

    /// Pre-create a bucket.
    pub fn with_bucket(self, name: &str) -> Self {
        lock(&self.state)
            .buckets
            .insert(name.to_string(), Arc::new(MemoryBucket::new(name)));
        self
    }

    /// Make every bucket lookup fail with `reason`.
    pub fn fail_lookups(self, reason: &str) -> Self {
        lock(&self.state).lookup_failure = Some(reason.to_string());
        self
    }

    pub fn bucket(&self, name: &str) -> Option<Arc<MemoryBucket>> {
        lock(&self.state).buckets.get(name).cloned()
    }

    /// Number of successful `connect` calls.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Number of `create_bucket` calls.
    pub fn buckets_created(&self) -> usize {
        self.buckets_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn connect(&self) -> Result<Box<dyn Connection>, StoreError> {
        if self.refuse_connections {
            return Err(StoreError::Connection("connection refused".to_string()));
        }
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl Connection for MemoryStore {
    async fn get_bucket(&self, name: &str) -> Result<Option<Arc<dyn Bucket>>, StoreError> {
        let state = lock(&self.state);
        if let Some(reason) = &state.lookup_failure {
            return Err(StoreError::BucketLookup {
                bucket: name.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(state
            .buckets
            .get(name)
            .map(|bucket| bucket.clone() as Arc<dyn Bucket>))
    }

    async fn create_bucket(&self, name: &str) -> Result<Arc<dyn Bucket>, StoreError> {
        self.buckets_created.fetch_add(1, Ordering::SeqCst);
        let bucket = lock(&self.state)
            .buckets
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryBucket::new(name)))
            .clone();
        Ok(bucket)
    }
}

/// A bucket of [`MemoryStore`].
pub struct MemoryBucket {
    name: String,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    failing_keys: Mutex<HashSet<String>>,
    puts: AtomicUsize,
}

impl MemoryBucket {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            objects: Mutex::new(BTreeMap::new()),
            failing_keys: Mutex::new(HashSet::new()),
            puts: AtomicUsize::new(0),
        }
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        lock(&self.objects).get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    /// Store an object directly, bypassing `put`.
    pub fn insert(&self, key: &str, body: &[u8], last_modified: DateTime<Utc>) {
        lock(&self.objects).insert(
            key.to_string(),
            StoredObject {
                body: body.to_vec(),
                metadata: BTreeMap::new(),
                visibility: Visibility::PublicRead,
                last_modified,
            },
        );
    }

    /// Make every `put` of `key` fail.
    pub fn fail_puts_for(&self, key: &str) {
        lock(&self.failing_keys).insert(key.to_string());
    }

    /// Number of successful `put` calls.
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, key: &str) -> Result<Option<RemoteObject>, StoreError> {
        Ok(lock(&self.objects).get(key).map(|object| RemoteObject {
            key: key.to_string(),
            last_modified: Some(object.last_modified.format(RFC1123_FORMAT).to_string()),
        }))
    }

    async fn put(&self, upload: Upload) -> Result<(), StoreError> {
        if lock(&self.failing_keys).contains(&upload.key) {
            return Err(StoreError::object(&upload.key, "access denied"));
        }
        lock(&self.objects).insert(
            upload.key,
            StoredObject {
                body: upload.body,
                metadata: upload.metadata,
                visibility: upload.visibility,
                last_modified: Utc::now(),
            },
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
