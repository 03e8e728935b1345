//! Timestamp-based change detection.
//!
//! A file is uploaded when it has no remote counterpart or when the remote
//! last-modified time differs from the local modification time at
//! one-second resolution. The comparison is an equality test: drift in
//! either direction counts as a change.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::Path;
use tracing::warn;

use crate::error::Result;
use crate::fs::LocalFs;
use crate::store::RemoteObject;

/// Parse a store timestamp into UTC.
///
/// Accepts RFC 1123 (`Wed, 01 May 2013 12:30:45 GMT`), RFC 3339 and the
/// `2013-05-01 12:30:45 UTC` form.
pub fn parse_remote_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc2822(value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%a, %d %b %Y %H:%M:%S GMT", "%Y-%m-%d %H:%M:%S%.f UTC"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts.and_utc());
        }
    }
    None
}

/// True when two instants fall in different UTC seconds.
pub fn timestamps_differ(remote: DateTime<Utc>, local: DateTime<Utc>) -> bool {
    remote.timestamp() != local.timestamp()
}

/// Decides whether a local file needs to be sent to the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector {
    force: bool,
}

impl ChangeDetector {
    /// `force` makes every file count as changed.
    pub fn new(force: bool) -> Self {
        Self { force }
    }

    /// Compare a remote timestamp with the local file's modification time.
    pub fn should_upload(&self, remote: Option<DateTime<Utc>>, local_path: &Path) -> Result<bool> {
        if self.force {
            return Ok(true);
        }
        match remote {
            None => Ok(true),
            Some(remote) => Ok(timestamps_differ(remote, LocalFs::modified(local_path)?)),
        }
    }

    /// Same as [`should_upload`](Self::should_upload), starting from a lookup
    /// result. Unparsable remote timestamps count as changed.
    pub fn should_upload_object(
        &self,
        remote: Option<&RemoteObject>,
        local_path: &Path,
    ) -> Result<bool> {
        let Some(object) = remote else {
            return Ok(true);
        };
        let Some(raw) = object.last_modified.as_deref() else {
            return Ok(true);
        };
        match parse_remote_timestamp(raw) {
            Some(ts) => self.should_upload(Some(ts), local_path),
            None => {
                warn!(key = %object.key, value = raw, "unparsable last-modified; uploading");
                Ok(true)
            }
        }
    }
}
