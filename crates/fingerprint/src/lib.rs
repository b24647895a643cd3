//! # Audio Fingerprint Model
//!
//! This crate defines the shapes that flow through query-time matching: the
//! hashed fingerprints extracted from an unknown sample, the sub-fingerprints
//! retrieved from a model store, the track references that tie them to
//! indexed tracks, and the configuration needed to interpret them.
//!
//! ## Contract
//!
//! - Fingerprint extraction (audio decoding, spectral framing, min-hashing)
//!   happens upstream. This crate starts from a packed min-hash signature.
//! - [`hash_buckets`] folds a signature into one LSH bucket id per hash table.
//!   For the same signature and [`HashingConfig`] the buckets are bit
//!   identical across runs and platforms.
//! - [`hamming_distance`] compares the packed signatures bit by bit.
//!
//! ## Example Usage
//!
//! ```
//! use fingerprint::{HashedFingerprint, HashingConfig, hamming_distance};
//!
//! let hashing = HashingConfig::new(4, 2);
//! let a = HashedFingerprint::new(0, 0.0, 1.0, vec![1, 2, 3, 4, 5, 6, 7, 8], &hashing).unwrap();
//! let b = HashedFingerprint::new(1, 1.0, 2.0, vec![1, 2, 3, 4, 5, 6, 7, 9], &hashing).unwrap();
//!
//! assert_eq!(a.hash_buckets.len(), 4);
//! assert_eq!(a.hash_buckets[..3], b.hash_buckets[..3]);
//! assert_eq!(hamming_distance(&a.signature, &b.signature), 1);
//! ```

pub mod config;
pub mod fingerprint;
mod hashing;

pub use crate::config::{FingerprintConfiguration, FingerprintError, HashingConfig};
pub use crate::fingerprint::{
    HashedFingerprint, SubFingerprint, SubFingerprintId, TrackData, TrackInfo, TrackReference,
};
pub use crate::hashing::{hamming_distance, hash_buckets};
