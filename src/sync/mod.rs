//! Sync pipeline: minification, change detection, metadata and the engine
//! that drives them against a bucket.

pub mod change;
pub mod engine;
pub mod metadata;
pub mod minify;

pub use change::{parse_remote_timestamp, ChangeDetector};
pub use engine::{SyncEngine, SyncPhase, SyncProgress, SyncReport};
pub use metadata::{MetadataResolver, MetadataRule};
pub use minify::{CommandRunner, MinificationEngine, MinifyJob, ShellRunner};
