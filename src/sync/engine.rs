//! Sync engine: minify, enumerate, resolve the bucket, publish.
//!
//! One call to [`SyncEngine::update`] walks through the phases
//! `Idle -> Minifying -> Enumerating -> Connected -> Uploading -> Done`,
//! ending in `Failed` when any phase returns an error. The bucket is
//! resolved exactly once, after minification has fully succeeded and before
//! the first upload starts.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SyncSpec;
use crate::error::{Result, SyncError, UploadFailure};
use crate::fs::paths::{compile_patterns, enumerate, matches_any, object_key, relative_to};
use crate::fs::LocalFs;
use crate::store::{Bucket, ObjectStore, Upload, Visibility};
use crate::sync::change::ChangeDetector;
use crate::sync::metadata::MetadataResolver;
use crate::sync::minify::{CommandRunner, MinificationEngine, ShellRunner};

/// Phase of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SyncPhase {
    #[default]
    Idle,
    Minifying,
    Enumerating,
    Connected,
    Uploading,
    Done,
    Failed,
}

/// Progress update for sync operations.
#[derive(Debug, Clone)]
pub struct SyncProgress {
    /// Current phase.
    pub phase: SyncPhase,
    /// Key of the file just processed, empty on phase changes.
    pub current_file: String,
    /// Files processed so far.
    pub files_done: usize,
    /// Total files to process.
    pub total_files: usize,
    /// Bytes uploaded so far.
    pub bytes_done: u64,
}

impl SyncProgress {
    fn phase(phase: SyncPhase) -> Self {
        Self {
            phase,
            current_file: String::new(),
            files_done: 0,
            total_files: 0,
            bytes_done: 0,
        }
    }
}

/// Summary of a sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub bucket: String,
    /// Minifier invocations (planned ones on a dry run).
    pub minified: usize,
    /// Files found under the root.
    pub scanned: usize,
    /// Files dropped by ignore patterns.
    pub ignored: usize,
    pub uploaded: Vec<String>,
    pub skipped: usize,
    /// Keys that would be uploaded, on a dry run.
    pub planned: Vec<String>,
    pub bytes_uploaded: u64,
    pub failures: Vec<UploadFailure>,
    pub bucket_created: bool,
    pub dry_run: bool,
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn recorded upload failures into an error.
    pub fn into_result(self) -> Result<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(SyncError::Upload {
                failures: self.failures,
            })
        }
    }
}

/// What happened to one file during the upload phase.
#[derive(Debug)]
enum FileOutcome {
    Uploaded { key: String, bytes: u64 },
    Skipped { key: String },
    Planned { key: String },
    Failed(UploadFailure),
}

impl FileOutcome {
    fn key(&self) -> &str {
        match self {
            Self::Uploaded { key, .. } | Self::Skipped { key } | Self::Planned { key } => key,
            Self::Failed(failure) => &failure.key,
        }
    }
}

/// Sync engine for publishing a directory tree into a bucket.
pub struct SyncEngine {
    spec: SyncSpec,
    store: Arc<dyn ObjectStore>,
    runner: Arc<dyn CommandRunner>,
    phase: SyncPhase,
    progress_tx: Option<tokio::sync::mpsc::Sender<SyncProgress>>,
}

impl SyncEngine {
    /// Create an engine that runs minifiers through the shell.
    pub fn new(spec: SyncSpec, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            spec,
            store,
            runner: Arc::new(ShellRunner),
            phase: SyncPhase::Idle,
            progress_tx: None,
        }
    }

    /// Replace the minifier process runner.
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Report progress on `progress_tx`.
    pub fn with_progress(mut self, progress_tx: tokio::sync::mpsc::Sender<SyncProgress>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    pub fn spec(&self) -> &SyncSpec {
        &self.spec
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Send a progress update.
    async fn send_progress(&self, progress: SyncProgress) {
        if let Some(ref tx) = self.progress_tx {
            let _ = tx.send(progress).await;
        }
    }

    async fn enter(&mut self, phase: SyncPhase) {
        debug!(?phase, "sync phase");
        self.phase = phase;
        self.send_progress(SyncProgress::phase(phase)).await;
    }

    /// Publish the root directory into `bucket_name`.
    pub async fn update(&mut self, bucket_name: &str) -> Result<SyncReport> {
        self.phase = SyncPhase::Idle;
        match self.run(bucket_name).await {
            Ok(report) => {
                self.enter(SyncPhase::Done).await;
                info!(
                    bucket = bucket_name,
                    uploaded = report.uploaded.len(),
                    skipped = report.skipped,
                    failed = report.failures.len(),
                    "sync complete"
                );
                Ok(report)
            }
            Err(err) => {
                self.enter(SyncPhase::Failed).await;
                Err(err)
            }
        }
    }

    async fn run(&mut self, bucket_name: &str) -> Result<SyncReport> {
        let started = Instant::now();
        self.spec.validate()?;
        if bucket_name.is_empty() {
            return Err(SyncError::Config("bucket name is empty".to_string()));
        }

        // Compiled once for the whole run
        let ignore = compile_patterns(&self.spec.ignore_patterns)?;
        let metadata = MetadataResolver::from_spec(&self.spec.metadata)?;
        let dry_run = self.spec.dry_run;

        let mut report = SyncReport {
            bucket: bucket_name.to_string(),
            dry_run,
            ..SyncReport::default()
        };

        self.enter(SyncPhase::Minifying).await;
        let minifier = MinificationEngine::from_spec(&self.spec, self.runner.clone());
        let spec = self.spec.clone();
        let patterns = ignore.clone();
        let jobs = tokio::task::spawn_blocking(move || {
            if dry_run {
                minifier.plan(&spec, &patterns)
            } else {
                minifier.minify(&spec, &patterns)
            }
        })
        .await??;
        report.minified = jobs.len();

        self.enter(SyncPhase::Enumerating).await;
        let root = self.spec.root_directory.clone();
        let patterns = ignore.clone();
        let mut enumeration =
            tokio::task::spawn_blocking(move || enumerate(&root, &patterns)).await??;
        report.ignored = enumeration.ignored.len();
        report.scanned = enumeration.files.len() + enumeration.ignored.len();

        // A dry run never writes minified outputs, so add the ones a real run
        // would publish. They count as changed since minifying rewrites them.
        let mut rewritten = HashSet::new();
        if dry_run {
            let root = self.spec.root_directory.as_path();
            for job in &jobs {
                if !job.output.starts_with(root)
                    || matches_any(&ignore, &relative_to(root, &job.output))
                {
                    continue;
                }
                if !enumeration.files.contains(&job.output) {
                    enumeration.files.push(job.output.clone());
                }
                rewritten.insert(job.output.clone());
            }
            enumeration.files.sort();
        }
        info!(
            root = %self.spec.root_directory.display(),
            files = enumeration.files.len(),
            ignored = report.ignored,
            "enumerated"
        );

        let bucket = self.resolve_bucket(bucket_name, &mut report).await?;
        self.enter(SyncPhase::Connected).await;

        self.enter(SyncPhase::Uploading).await;
        self.upload_all(
            bucket.as_deref(),
            enumeration.files,
            &rewritten,
            &metadata,
            &mut report,
        )
        .await;

        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Find the target bucket, creating it when it is confirmed absent.
    ///
    /// Returns `None` only on a dry run against a missing bucket.
    async fn resolve_bucket(
        &self,
        bucket_name: &str,
        report: &mut SyncReport,
    ) -> Result<Option<Arc<dyn Bucket>>> {
        let connection = self.store.connect().await?;
        if let Some(bucket) = connection.get_bucket(bucket_name).await? {
            return Ok(Some(bucket));
        }
        if self.spec.dry_run {
            info!(bucket = bucket_name, "bucket missing; would create");
            return Ok(None);
        }
        info!(bucket = bucket_name, store = self.store.kind(), "creating bucket");
        let bucket = connection.create_bucket(bucket_name).await?;
        report.bucket_created = true;
        Ok(Some(bucket))
    }

    async fn upload_all(
        &self,
        bucket: Option<&dyn Bucket>,
        files: Vec<PathBuf>,
        rewritten: &HashSet<PathBuf>,
        metadata: &MetadataResolver,
        report: &mut SyncReport,
    ) {
        let total_files = files.len();
        let detector = ChangeDetector::new(self.spec.force_update);
        let root = self.spec.root_directory.as_path();
        let dry_run = self.spec.dry_run;

        let mut outcomes = stream::iter(files.into_iter().map(|path| {
            let detector = if rewritten.contains(&path) {
                ChangeDetector::new(true)
            } else {
                detector
            };
            publish_file(bucket, root, path, detector, metadata, dry_run)
        }))
        .buffer_unordered(self.spec.concurrency);

        let mut files_done = 0;
        while let Some(outcome) = outcomes.next().await {
            files_done += 1;
            let current_file = outcome.key().to_string();
            match outcome {
                FileOutcome::Uploaded { key, bytes } => {
                    report.bytes_uploaded += bytes;
                    report.uploaded.push(key);
                }
                FileOutcome::Skipped { .. } => report.skipped += 1,
                FileOutcome::Planned { key } => report.planned.push(key),
                FileOutcome::Failed(failure) => {
                    warn!(key = %failure.key, reason = %failure.reason, "upload failed");
                    report.failures.push(failure);
                }
            }
            self.send_progress(SyncProgress {
                phase: SyncPhase::Uploading,
                current_file,
                files_done,
                total_files,
                bytes_done: report.bytes_uploaded,
            })
            .await;
        }

        report.uploaded.sort();
        report.planned.sort();
        report.failures.sort_by(|a, b| a.key.cmp(&b.key));
    }
}

/// Decide on and, if needed, upload a single file.
async fn publish_file(
    bucket: Option<&dyn Bucket>,
    root: &Path,
    path: PathBuf,
    detector: ChangeDetector,
    metadata: &MetadataResolver,
    dry_run: bool,
) -> FileOutcome {
    let key = object_key(root, &path);
    let failed = |key: String, reason: String| FileOutcome::Failed(UploadFailure { key, reason });

    let remote = match bucket {
        Some(bucket) => match bucket.lookup(&key).await {
            Ok(remote) => remote,
            Err(e) => return failed(key, e.to_string()),
        },
        None => None,
    };

    match detector.should_upload_object(remote.as_ref(), &path) {
        Ok(true) => {}
        Ok(false) => {
            debug!(key = %key, "unchanged");
            return FileOutcome::Skipped { key };
        }
        Err(e) => return failed(key, e.to_string()),
    }

    let Some(bucket) = bucket.filter(|_| !dry_run) else {
        debug!(key = %key, "would upload");
        return FileOutcome::Planned { key };
    };

    let body = match LocalFs::read(&path).await {
        Ok(body) => body,
        Err(e) => return failed(key, e.to_string()),
    };
    let bytes = body.len() as u64;
    let upload = Upload {
        metadata: metadata.resolve(&key),
        key: key.clone(),
        body,
        visibility: Visibility::PublicRead,
    };

    match bucket.put(upload).await {
        Ok(()) => {
            debug!(key = %key, bytes, "uploaded");
            FileOutcome::Uploaded { key, bytes }
        }
        Err(e) => failed(key, e.to_string()),
    }
}
