//! Per-track match accumulation.
//!
//! Every accepted (query fingerprint, stored sub-fingerprint) pair becomes a
//! [`MatchedWith`] record in the [`ResultEntryAccumulator`] of the owning
//! track. Accumulators live in a concurrent [`AccumulatorMap`] that rayon
//! workers update in place while retrieval fans out over the query.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use fingerprint::{
    hamming_distance, HashedFingerprint, SubFingerprint, SubFingerprintId, TrackReference,
};

/// Concurrent map from track to its accumulated matches.
pub type AccumulatorMap = DashMap<TrackReference, ResultEntryAccumulator>;

/// One accepted pairing of a query fingerprint with a stored sub-fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedWith {
    /// Sequence number of the query fingerprint.
    pub query_sequence: u32,
    pub query_starts_at: f64,
    pub query_ends_at: f64,
    /// Stored sub-fingerprint the query fingerprint matched.
    pub sub_fingerprint: Arc<SubFingerprint>,
    /// Bit distance between the two signatures over the hashed prefix.
    pub hamming_distance: u32,
}

impl MatchedWith {
    pub fn track_sequence(&self) -> u32 {
        self.sub_fingerprint.sequence_number
    }
}

/// Matches collected for one candidate track.
///
/// Records are keyed by (query sequence, sub-fingerprint id), so the same
/// pairing reported twice is stored once and iteration order does not depend
/// on the order in which workers inserted them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultEntryAccumulator {
    matches: BTreeMap<(u32, SubFingerprintId), MatchedWith>,
    min_hamming_distance: Option<u32>,
}

impl ResultEntryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a match. Returns `false` when the pairing was already present.
    pub fn add(
        &mut self,
        query: &HashedFingerprint,
        sub_fingerprint: Arc<SubFingerprint>,
        hamming_distance: u32,
    ) -> bool {
        let key = (query.sequence_number, sub_fingerprint.id);
        if self.matches.contains_key(&key) {
            return false;
        }
        self.min_hamming_distance = Some(
            self.min_hamming_distance
                .map_or(hamming_distance, |current| current.min(hamming_distance)),
        );
        self.matches.insert(
            key,
            MatchedWith {
                query_sequence: query.sequence_number,
                query_starts_at: query.start_at,
                query_ends_at: query.end_at,
                sub_fingerprint,
                hamming_distance,
            },
        );
        true
    }

    /// Matches ordered by query sequence, then sub-fingerprint id.
    pub fn matches(&self) -> impl Iterator<Item = &MatchedWith> {
        self.matches.values()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Smallest distance recorded so far, `None` while empty.
    pub fn min_hamming_distance(&self) -> Option<u32> {
        self.min_hamming_distance
    }
}

/// Scores candidates against a query fingerprint and records them.
pub trait SimilarityAccumulator: Send + Sync {
    /// Add every candidate to the accumulator of its owning track.
    ///
    /// `min_hashes_per_table` defines the signature prefix that was hashed
    /// into buckets; only that prefix is compared.
    fn accumulate<I>(
        &self,
        candidates: I,
        query: &HashedFingerprint,
        accumulators: &AccumulatorMap,
        min_hashes_per_table: usize,
    ) where
        I: IntoIterator<Item = Arc<SubFingerprint>>;
}

/// Default accumulator: Hamming distance over the hashed signature prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct HammingSimilarity;

impl SimilarityAccumulator for HammingSimilarity {
    fn accumulate<I>(
        &self,
        candidates: I,
        query: &HashedFingerprint,
        accumulators: &AccumulatorMap,
        min_hashes_per_table: usize,
    ) where
        I: IntoIterator<Item = Arc<SubFingerprint>>,
    {
        let keys = query.hash_tables() * min_hashes_per_table;
        for candidate in candidates {
            let distance = prefix_distance(&query.signature, &candidate.signature, keys);
            let track = candidate.track;
            // Holds the shard lock for `track` only.
            accumulators
                .entry(track)
                .or_default()
                .add(query, candidate, distance);
        }
    }
}

fn prefix_distance(a: &[u8], b: &[u8], keys: usize) -> u32 {
    if keys == 0 {
        return hamming_distance(a, b);
    }
    hamming_distance(&a[..keys.min(a.len())], &b[..keys.min(b.len())])
}
