// Library module for collectr
// Re-exports modules for use in integration tests and the binary

pub mod config;
pub mod error;
pub mod fs;
pub mod store;
pub mod sync;

pub use config::{ConfigFile, MetadataValue, Minifier, StoreConfig, SyncSpec};
pub use error::{Result, StoreError, SyncError};
pub use sync::{SyncEngine, SyncPhase, SyncReport};
