//! Sync configuration.
//!
//! A [`SyncSpec`] is built once per invocation, either from a TOML file or
//! from command-line flags, and is then passed by reference to every stage
//! of the sync. Nothing in here is mutated after construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "collectr.toml";

/// Minifier configuration: one command for CSS and JS, or one per extension.
///
/// A command template must contain both `{in_name}` and `{out_name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Minifier {
    Uniform(String),
    PerExtension(BTreeMap<String, String>),
}

impl Minifier {
    /// Extensions a uniform minifier applies to.
    pub const DEFAULT_EXTENSIONS: [&'static str; 2] = ["css", "js"];

    /// Resolve into a concrete extension -> command map with lower-cased keys.
    pub fn commands(&self) -> BTreeMap<String, String> {
        match self {
            Minifier::Uniform(command) => Self::DEFAULT_EXTENSIONS
                .iter()
                .map(|ext| (ext.to_string(), command.clone()))
                .collect(),
            Minifier::PerExtension(map) => map
                .iter()
                .map(|(ext, command)| {
                    (ext.trim_start_matches('.').to_lowercase(), command.clone())
                })
                .collect(),
        }
    }
}

/// One entry of the metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Applied to every object.
    Global(String),
    /// Applied to objects whose key matches the entry's key.
    Pattern(BTreeMap<String, String>),
}

fn default_concurrency() -> usize {
    num_cpus::get().max(1)
}

/// The configuration a sync operates under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSpec {
    /// Directory mirrored into the bucket.
    pub root_directory: PathBuf,
    /// When set, sources are read from here and minified output lands under
    /// `root_directory`.
    pub input_directory: Option<PathBuf>,
    pub minifier: Option<Minifier>,
    /// Upload every matched file regardless of remote timestamps.
    pub force_update: bool,
    /// Regular expressions matched against paths relative to the root.
    pub ignore_patterns: Vec<String>,
    pub metadata: BTreeMap<String, MetadataValue>,
    /// Plan the run without invoking minifiers or writing objects.
    pub dry_run: bool,
    /// Maximum number of uploads in flight.
    pub concurrency: usize,
}

impl Default for SyncSpec {
    fn default() -> Self {
        Self {
            root_directory: PathBuf::new(),
            input_directory: None,
            minifier: None,
            force_update: false,
            ignore_patterns: Vec::new(),
            metadata: BTreeMap::new(),
            dry_run: false,
            concurrency: default_concurrency(),
        }
    }
}

impl SyncSpec {
    /// Create a spec publishing `root` with everything else defaulted.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root_directory: root.into(),
            ..Self::default()
        }
    }

    pub fn with_input_directory(mut self, input: impl Into<PathBuf>) -> Self {
        self.input_directory = Some(input.into());
        self
    }

    pub fn with_minifier(mut self, minifier: Minifier) -> Self {
        self.minifier = Some(minifier);
        self
    }

    pub fn with_force_update(mut self, force: bool) -> Self {
        self.force_update = force;
        self
    }

    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, MetadataValue>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Directory the minifier reads from.
    pub fn source_directory(&self) -> &Path {
        self.input_directory
            .as_deref()
            .unwrap_or(&self.root_directory)
    }

    /// Effective extension -> command map; empty when no minifier is set.
    pub fn minifier_commands(&self) -> BTreeMap<String, String> {
        self.minifier
            .as_ref()
            .map(Minifier::commands)
            .unwrap_or_default()
    }

    /// Check the invariants a sync relies on.
    pub fn validate(&self) -> Result<()> {
        if self.root_directory.as_os_str().is_empty() {
            return Err(SyncError::Config("root directory is empty".to_string()));
        }
        if self.concurrency == 0 {
            return Err(SyncError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        for (ext, command) in self.minifier_commands() {
            if !command.contains("{in_name}") || !command.contains("{out_name}") {
                return Err(SyncError::Config(format!(
                    "minifier for .{} must contain {{in_name}} and {{out_name}}: {}",
                    ext, command
                )));
            }
        }
        Ok(())
    }
}

/// S3 connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub region: String,
    /// One of `aws`, `digitalocean`, `hetzner`, `minio`, `r2`, `wasabi`.
    pub provider: String,
    /// Overrides the provider endpoint.
    pub endpoint: Option<String>,
    /// Falls back to the AWS credential chain when unset.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            provider: "aws".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

/// Local directory store settings; each bucket is a subdirectory of `root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsConfig {
    pub root: PathBuf,
}

/// Which object store to publish to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    S3(S3Config),
    Fs(FsConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::S3(S3Config::default())
    }
}

/// Layout of `collectr.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub bucket: Option<String>,
    pub sync: SyncSpec,
    pub store: StoreConfig,
}

impl ConfigFile {
    /// Parse a config file from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
        Self::parse(&content)
    }

    /// Find the config file to use.
    ///
    /// An explicit path must exist. Otherwise `./collectr.toml` and then the
    /// user config directory are tried, in that order.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("collectr").join(CONFIG_FILE_NAME))
            .filter(|path| path.is_file())
    }
}
