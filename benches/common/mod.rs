//! Common utilities for Tunematch benchmarks
//!
//! Shared helpers for building catalogs and query snippets so every bench
//! measures the same data.

#![allow(dead_code)]

use tunematch::{
    FingerprintConfiguration, HashedFingerprint, HashingConfig, InMemoryModelStore,
    QueryConfiguration, TrackInfo, hash_signatures, index_track, synthetic_signatures,
};

/// Fingerprints stored per catalog track
pub const FINGERPRINTS_PER_TRACK: usize = 200;

/// Production-like layout: 25 tables of 4 min-hashes.
pub fn fingerprint_cfg() -> FingerprintConfiguration {
    FingerprintConfiguration::default().with_hashing(HashingConfig::new(25, 4))
}

pub fn query_cfg() -> QueryConfiguration {
    QueryConfiguration::default().with_fingerprint(fingerprint_cfg())
}

/// Build an in-memory catalog of `tracks` synthetic tracks.
pub fn setup_catalog(tracks: u64, batched: bool) -> InMemoryModelStore {
    let store = InMemoryModelStore::new().with_batched_queries(batched);
    let cfg = fingerprint_cfg();
    for seed in 0..tracks {
        let signatures = synthetic_signatures(seed, FINGERPRINTS_PER_TRACK, &cfg.hashing);
        index_track(
            &store,
            TrackInfo::new("Bench", format!("Track {seed}"), 180.0),
            &signatures,
            &cfg,
        )
        .expect("index track");
    }
    store
}

/// Hashed snippet of `len` fingerprints taken from track `seed` at `offset`.
pub fn snippet(seed: u64, offset: usize, len: usize) -> Vec<HashedFingerprint> {
    let cfg = fingerprint_cfg();
    let signatures = synthetic_signatures(seed, FINGERPRINTS_PER_TRACK, &cfg.hashing);
    hash_signatures(&signatures[offset..offset + len], 0, &cfg).expect("hash snippet")
}
