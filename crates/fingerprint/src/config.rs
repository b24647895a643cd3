//! Configuration and error types for hashed audio fingerprints.
//!
//! Nothing here performs I/O. The configuration describes how a min-hash
//! signature was banded into hash tables and how fingerprint sequence numbers
//! map onto the audio timeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// LSH banding parameters shared by the indexing and query sides.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HashingConfig {
    /// Number of hash tables (bands). Each table yields one bucket id.
    pub hash_tables: usize,
    /// Number of min-hash keys (signature bytes) folded into one bucket.
    pub min_hashes_per_table: usize,
}

impl HashingConfig {
    pub const fn new(hash_tables: usize, min_hashes_per_table: usize) -> Self {
        Self {
            hash_tables,
            min_hashes_per_table,
        }
    }

    /// Set the number of hash tables. Typical values: 20-32.
    /// More tables = higher recall, more candidates per lookup.
    pub fn with_hash_tables(mut self, hash_tables: usize) -> Self {
        self.hash_tables = hash_tables;
        self
    }

    /// Set the number of min-hash keys per table. Typical values: 3-5.
    /// More keys = stricter buckets, fewer false candidates.
    pub fn with_min_hashes_per_table(mut self, min_hashes_per_table: usize) -> Self {
        self.min_hashes_per_table = min_hashes_per_table;
        self
    }

    /// Number of signature bytes consumed by banding.
    pub fn signature_len(&self) -> usize {
        self.hash_tables * self.min_hashes_per_table
    }

    pub fn validate(&self) -> Result<(), FingerprintError> {
        if self.hash_tables < 1 {
            return Err(FingerprintError::InvalidHashTables {
                hash_tables: self.hash_tables,
            });
        }
        if self.min_hashes_per_table < 1 {
            return Err(FingerprintError::InvalidMinHashesPerTable {
                min_hashes: self.min_hashes_per_table,
            });
        }
        Ok(())
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self::new(25, 4)
    }
}

/// Timing and hashing layout of a fingerprint stream.
///
/// Fingerprints are fixed-length slices of audio taken every `stride_secs`.
/// A sub-fingerprint with sequence number `n` therefore starts at
/// `n * stride_secs` within its track.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FingerprintConfiguration {
    /// Duration of audio covered by a single fingerprint.
    pub fingerprint_length_secs: f64,
    /// Offset between the starts of two consecutive fingerprints.
    pub stride_secs: f64,
    /// LSH banding used to produce hash buckets.
    pub hashing: HashingConfig,
}

impl FingerprintConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fingerprint_length(mut self, secs: f64) -> Self {
        self.fingerprint_length_secs = secs;
        self
    }

    pub fn with_stride(mut self, secs: f64) -> Self {
        self.stride_secs = secs;
        self
    }

    pub fn with_hashing(mut self, hashing: HashingConfig) -> Self {
        self.hashing = hashing;
        self
    }

    /// Duration each fingerprint accounts for when computing coverage.
    pub fn frame_duration(&self) -> f64 {
        self.fingerprint_length_secs
    }

    /// Start offset of the fingerprint with the given sequence number.
    pub fn start_at(&self, sequence_number: u32) -> f64 {
        f64::from(sequence_number) * self.stride_secs
    }

    /// End offset of the fingerprint with the given sequence number.
    pub fn end_at(&self, sequence_number: u32) -> f64 {
        self.start_at(sequence_number) + self.fingerprint_length_secs
    }

    pub fn validate(&self) -> Result<(), FingerprintError> {
        if !(self.fingerprint_length_secs > 0.0) {
            return Err(FingerprintError::InvalidFingerprintLength {
                secs: self.fingerprint_length_secs,
            });
        }
        if !(self.stride_secs > 0.0) {
            return Err(FingerprintError::InvalidStride {
                secs: self.stride_secs,
            });
        }
        self.hashing.validate()
    }
}

impl Default for FingerprintConfiguration {
    // 128 frames of 64 samples at 5512 Hz, sampled every 5115 samples.
    fn default() -> Self {
        Self {
            fingerprint_length_secs: 8192.0 / 5512.0,
            stride_secs: 5115.0 / 5512.0,
            hashing: HashingConfig::default(),
        }
    }
}

/// Errors raised while validating configuration or building fingerprints.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FingerprintError {
    #[error("invalid config: hash_tables must be >= 1 (got {hash_tables})")]
    InvalidHashTables { hash_tables: usize },

    #[error("invalid config: min_hashes_per_table must be >= 1 (got {min_hashes})")]
    InvalidMinHashesPerTable { min_hashes: usize },

    #[error("invalid config: fingerprint_length_secs must be > 0 (got {secs})")]
    InvalidFingerprintLength { secs: f64 },

    #[error("invalid config: stride_secs must be > 0 (got {secs})")]
    InvalidStride { secs: f64 },

    #[error("signature too short: expected at least {expected} bytes, got {actual}")]
    SignatureTooShort { expected: usize, actual: usize },
}
