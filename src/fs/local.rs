use chrono::{DateTime, Utc};
use std::path::Path;

use crate::error::{Result, SyncError};

/// Local filesystem facts needed by a sync.
pub struct LocalFs;

impl LocalFs {
    /// Modification time of `path` in UTC.
    pub fn modified(path: &Path) -> Result<DateTime<Utc>> {
        let metadata = std::fs::metadata(path).map_err(|e| SyncError::io(path, e))?;
        let modified = metadata.modified().map_err(|e| SyncError::io(path, e))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    /// Read a whole file for upload.
    pub async fn read(path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| SyncError::io(path, e))
    }

    /// Create the parent directory of `path` if needed.
    pub fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
            }
        }
        Ok(())
    }
}
