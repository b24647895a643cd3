//! YAML Configuration File Support for Tunematch
//!
//! This module loads the fingerprint layout, query tuning, and store options
//! from a single YAML file so deployments can adjust matching without a
//! rebuild.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! # Tunematch Configuration
//! version: "1.0"
//!
//! fingerprint:
//!   fingerprint_length_secs: 1.486
//!   stride_secs: 0.928
//!   hash_tables: 25
//!   min_hashes_per_table: 4
//!
//! query:
//!   max_tracks_to_return: 10
//!   threshold_votes: 5
//!   max_alignment_gap: 5
//!   min_aligned_matches: 2
//!   max_candidates_per_fingerprint: 64
//!
//! store:
//!   batched_queries: true
//! ```

use std::fs;
use std::path::Path;

use fingerprint::{FingerprintConfiguration, HashingConfig};
use matcher::QueryConfiguration;
use serde::{Deserialize, Serialize};
use store::InMemoryModelStore;
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level YAML configuration for the matching engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Fingerprint timing and LSH layout
    #[serde(default)]
    pub fingerprint: FingerprintYamlConfig,

    /// Per-query tuning
    #[serde(default)]
    pub query: QueryYamlConfig,

    /// Model store options
    #[serde(default)]
    pub store: StoreYamlConfig,
}

impl EngineConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigLoadError> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.fingerprint.validate()?;
        self.query.validate()?;
        // Cross-section rules (vote threshold vs. table count) live in the
        // query configuration itself.
        self.query_configuration()
            .validate()
            .map_err(|err| ConfigLoadError::Validation(err.to_string()))?;
        Ok(())
    }

    pub fn fingerprint_configuration(&self) -> FingerprintConfiguration {
        FingerprintConfiguration::default()
            .with_fingerprint_length(self.fingerprint.fingerprint_length_secs)
            .with_stride(self.fingerprint.stride_secs)
            .with_hashing(HashingConfig::new(
                self.fingerprint.hash_tables,
                self.fingerprint.min_hashes_per_table,
            ))
    }

    pub fn query_configuration(&self) -> QueryConfiguration {
        QueryConfiguration::default()
            .with_fingerprint(self.fingerprint_configuration())
            .with_max_tracks_to_return(self.query.max_tracks_to_return)
            .with_threshold_votes(self.query.threshold_votes)
            .with_max_alignment_gap(self.query.max_alignment_gap)
            .with_min_aligned_matches(self.query.min_aligned_matches)
            .with_max_candidates_per_fingerprint(self.query.max_candidates_per_fingerprint)
    }

    /// Empty in-memory store honoring the `store` section.
    pub fn in_memory_store(&self) -> InMemoryModelStore {
        InMemoryModelStore::new().with_batched_queries(self.store.batched_queries)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            fingerprint: FingerprintYamlConfig::default(),
            query: QueryYamlConfig::default(),
            store: StoreYamlConfig::default(),
        }
    }
}

/// Fingerprint YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintYamlConfig {
    #[serde(default = "default_fingerprint_length")]
    pub fingerprint_length_secs: f64,

    #[serde(default = "default_stride")]
    pub stride_secs: f64,

    #[serde(default = "default_hash_tables")]
    pub hash_tables: usize,

    #[serde(default = "default_min_hashes_per_table")]
    pub min_hashes_per_table: usize,
}

impl FingerprintYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if !(self.fingerprint_length_secs > 0.0) {
            return Err(ConfigLoadError::Validation(
                "fingerprint.fingerprint_length_secs must be > 0".to_string(),
            ));
        }
        if !(self.stride_secs > 0.0) {
            return Err(ConfigLoadError::Validation(
                "fingerprint.stride_secs must be > 0".to_string(),
            ));
        }
        if self.hash_tables == 0 {
            return Err(ConfigLoadError::Validation(
                "fingerprint.hash_tables must be >= 1".to_string(),
            ));
        }
        if self.min_hashes_per_table == 0 {
            return Err(ConfigLoadError::Validation(
                "fingerprint.min_hashes_per_table must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for FingerprintYamlConfig {
    fn default() -> Self {
        Self {
            fingerprint_length_secs: default_fingerprint_length(),
            stride_secs: default_stride(),
            hash_tables: default_hash_tables(),
            min_hashes_per_table: default_min_hashes_per_table(),
        }
    }
}

/// Query YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryYamlConfig {
    #[serde(default = "default_max_tracks")]
    pub max_tracks_to_return: usize,

    #[serde(default = "default_threshold_votes")]
    pub threshold_votes: usize,

    #[serde(default = "default_max_alignment_gap")]
    pub max_alignment_gap: u32,

    #[serde(default = "default_min_aligned_matches")]
    pub min_aligned_matches: usize,

    #[serde(default)]
    pub max_candidates_per_fingerprint: Option<usize>,
}

impl QueryYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.max_tracks_to_return == 0 {
            return Err(ConfigLoadError::Validation(
                "query.max_tracks_to_return must be >= 1".to_string(),
            ));
        }
        if self.threshold_votes == 0 {
            return Err(ConfigLoadError::Validation(
                "query.threshold_votes must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for QueryYamlConfig {
    fn default() -> Self {
        Self {
            max_tracks_to_return: default_max_tracks(),
            threshold_votes: default_threshold_votes(),
            max_alignment_gap: default_max_alignment_gap(),
            min_aligned_matches: default_min_aligned_matches(),
            max_candidates_per_fingerprint: None,
        }
    }
}

/// Store YAML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreYamlConfig {
    /// Serve each query with a single bulk candidate read.
    #[serde(default)]
    pub batched_queries: bool,
}

// Helper functions for serde defaults
fn default_fingerprint_length() -> f64 {
    FingerprintConfiguration::default().fingerprint_length_secs
}
fn default_stride() -> f64 {
    FingerprintConfiguration::default().stride_secs
}
fn default_hash_tables() -> usize {
    HashingConfig::default().hash_tables
}
fn default_min_hashes_per_table() -> usize {
    HashingConfig::default().min_hashes_per_table
}
fn default_max_tracks() -> usize {
    QueryConfiguration::default().max_tracks_to_return
}
fn default_threshold_votes() -> usize {
    QueryConfiguration::default().threshold_votes
}
fn default_max_alignment_gap() -> u32 {
    QueryConfiguration::default().max_alignment_gap
}
fn default_min_aligned_matches() -> usize {
    QueryConfiguration::default().min_aligned_matches
}
