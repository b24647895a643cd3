//! # Audio Model Store
//!
//! The model store holds indexed tracks and their sub-fingerprints and answers
//! LSH bucket lookups at query time. The matcher consumes it exclusively
//! through the [`ModelStore`] trait so storage engines can be swapped without
//! touching the matching logic.
//!
//! Out of the box this crate provides [`InMemoryModelStore`], a `RwLock`
//! guarded set of inverted indexes (one per hash table) that is fast enough
//! for tests, demos, and catalogs that fit in memory.
//!
//! ## Example Usage
//!
//! ```
//! use fingerprint::{HashedFingerprint, HashingConfig, TrackInfo};
//! use store::{InMemoryModelStore, ModelStore, StoreQuery};
//!
//! let hashing = HashingConfig::new(2, 2);
//! let store = InMemoryModelStore::new();
//! let track = store.insert_track(TrackInfo::new("Artist", "Title", 180.0));
//!
//! let fp = HashedFingerprint::new(0, 0.0, 1.0, vec![1, 2, 3, 4], &hashing).unwrap();
//! store.insert_hashed_fingerprints(&track, vec![fp.clone()]).unwrap();
//!
//! let hits = store
//!     .read_sub_fingerprints(&fp.hash_buckets, &StoreQuery::new(2))
//!     .unwrap();
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].track, track);
//! ```

mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use fingerprint::{SubFingerprint, TrackData, TrackReference};
use thiserror::Error;

pub use crate::memory::InMemoryModelStore;

/// Per-call lookup parameters the matcher hands to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreQuery {
    /// Minimum number of identical hash-table buckets for a candidate to be
    /// returned by a single-fingerprint lookup.
    pub threshold_votes: usize,
    /// Optional cap on the candidates returned by a single-fingerprint lookup.
    pub max_candidates: Option<usize>,
}

impl StoreQuery {
    pub fn new(threshold_votes: usize) -> Self {
        Self {
            threshold_votes,
            max_candidates: None,
        }
    }

    pub fn with_max_candidates(mut self, max_candidates: Option<usize>) -> Self {
        self.max_candidates = max_candidates;
        self
    }
}

/// Read side of a fingerprint model store.
pub trait ModelStore: Send + Sync {
    /// Whether [`ModelStore::read_sub_fingerprints_batch`] is natively
    /// supported. The matcher picks its retrieval strategy from this flag.
    fn supports_batched_query(&self) -> bool {
        false
    }

    /// Sub-fingerprints sharing at least `query.threshold_votes` buckets with
    /// the given per-table bucket ids.
    fn read_sub_fingerprints(
        &self,
        hash_buckets: &[u64],
        query: &StoreQuery,
    ) -> Result<Vec<Arc<SubFingerprint>>, StoreError>;

    /// Deduplicated union of sub-fingerprints sharing at least one bucket with
    /// any of the given fingerprints. Callers re-filter per fingerprint.
    fn read_sub_fingerprints_batch(
        &self,
        hash_buckets: &[&[u64]],
        _query: &StoreQuery,
    ) -> Result<Vec<Arc<SubFingerprint>>, StoreError> {
        let single = StoreQuery::new(1);
        let mut union = BTreeMap::new();
        for buckets in hash_buckets {
            for candidate in self.read_sub_fingerprints(buckets, &single)? {
                union.entry(candidate.id).or_insert(candidate);
            }
        }
        Ok(union.into_values().collect())
    }

    /// Resolve a track reference to its stored record.
    fn read_track(&self, reference: &TrackReference) -> Result<Option<TrackData>, StoreError>;
}

impl<S: ModelStore + ?Sized> ModelStore for Arc<S> {
    fn supports_batched_query(&self) -> bool {
        (**self).supports_batched_query()
    }

    fn read_sub_fingerprints(
        &self,
        hash_buckets: &[u64],
        query: &StoreQuery,
    ) -> Result<Vec<Arc<SubFingerprint>>, StoreError> {
        (**self).read_sub_fingerprints(hash_buckets, query)
    }

    fn read_sub_fingerprints_batch(
        &self,
        hash_buckets: &[&[u64]],
        query: &StoreQuery,
    ) -> Result<Vec<Arc<SubFingerprint>>, StoreError> {
        (**self).read_sub_fingerprints_batch(hash_buckets, query)
    }

    fn read_track(&self, reference: &TrackReference) -> Result<Option<TrackData>, StoreError> {
        (**self).read_track(reference)
    }
}

/// Errors surfaced by model stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Unknown track: {0}")]
    UnknownTrack(String),
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}

impl StoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}
