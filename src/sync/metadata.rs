//! Resolution of configured metadata into per-object key/value pairs.

use regex::Regex;
use std::collections::BTreeMap;

use crate::config::MetadataValue;
use crate::error::{Result, SyncError};

/// A compiled metadata rule.
#[derive(Debug, Clone)]
pub enum MetadataRule {
    /// Pairs applied to objects whose key contains a match for the pattern.
    Pattern(Regex, BTreeMap<String, String>),
    /// A pair applied to every object.
    Global(String, String),
}

impl MetadataRule {
    fn apply(&self, object_key: &str, out: &mut BTreeMap<String, String>) {
        match self {
            MetadataRule::Pattern(pattern, pairs) => {
                if pattern.is_match(object_key) {
                    out.extend(pairs.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            MetadataRule::Global(key, value) => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Compiled metadata configuration, built once per sync.
#[derive(Debug, Clone, Default)]
pub struct MetadataResolver {
    rules: Vec<MetadataRule>,
}

impl MetadataResolver {
    /// Compile the configured table. Table values become pattern rules,
    /// string values become global rules.
    pub fn from_spec(metadata: &BTreeMap<String, MetadataValue>) -> Result<Self> {
        let mut rules = Vec::with_capacity(metadata.len());
        for (key, value) in metadata {
            let rule = match value {
                MetadataValue::Global(value) => MetadataRule::Global(key.clone(), value.clone()),
                MetadataValue::Pattern(pairs) => {
                    let pattern = Regex::new(key).map_err(|source| SyncError::InvalidPattern {
                        pattern: key.clone(),
                        source,
                    })?;
                    MetadataRule::Pattern(pattern, pairs.clone())
                }
            };
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[MetadataRule] {
        &self.rules
    }

    /// Metadata for one object. Rules run in key order; a later rule
    /// overwrites an earlier one on the same metadata key.
    pub fn resolve(&self, object_key: &str) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for rule in &self.rules {
            rule.apply(object_key, &mut out);
        }
        out
    }
}
