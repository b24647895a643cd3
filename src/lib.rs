//! Workspace umbrella crate for Tunematch.
//!
//! This crate stitches together the fingerprint data model, the model store,
//! and the query matcher so callers can index tracks and identify audio
//! snippets through a single API surface.

pub mod config;

pub use fingerprint::{
    FingerprintConfiguration, FingerprintError, HashedFingerprint, HashingConfig, SubFingerprint,
    SubFingerprintId, TrackData, TrackInfo, TrackReference, hamming_distance, hash_buckets,
};
pub use matcher::{
    AccumulatorMap, AlignmentSelector, CandidateSelector, HammingSimilarity, MatchError,
    MatchMetrics, MatchedWith, Matcher, QueryConfiguration, QueryMatches, QueryResult,
    ResultEntry, ResultEntryAccumulator, RetrievalStrategy, SimilarityAccumulator,
    best_alignment, passes_threshold_votes, set_match_metrics,
};
pub use store::{InMemoryModelStore, ModelStore, StoreError, StoreQuery};

pub use crate::config::{ConfigLoadError, EngineConfig};

use std::error::Error;
use std::fmt;

use tracing::{info, warn};

/// Errors that can occur while indexing or querying through the umbrella API.
#[derive(Debug)]
pub enum EngineError {
    Fingerprint(FingerprintError),
    Store(StoreError),
    Match(MatchError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Fingerprint(err) => write!(f, "fingerprint failure: {err}"),
            EngineError::Store(err) => write!(f, "store failure: {err}"),
            EngineError::Match(err) => write!(f, "match failure: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineError::Fingerprint(err) => Some(err),
            EngineError::Store(err) => Some(err),
            EngineError::Match(err) => Some(err),
        }
    }
}

impl From<FingerprintError> for EngineError {
    fn from(value: FingerprintError) -> Self {
        EngineError::Fingerprint(value)
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        EngineError::Store(value)
    }
}

impl From<MatchError> for EngineError {
    fn from(value: MatchError) -> Self {
        EngineError::Match(value)
    }
}

/// Turn consecutive min-hash signatures into timed, hashed fingerprints.
///
/// Signature `i` gets sequence number `first_sequence + i` and the timing the
/// configuration derives for that sequence number.
pub fn hash_signatures(
    signatures: &[Vec<u8>],
    first_sequence: u32,
    cfg: &FingerprintConfiguration,
) -> Result<Vec<HashedFingerprint>, FingerprintError> {
    cfg.validate()?;
    signatures
        .iter()
        .zip(first_sequence..)
        .map(|(signature, sequence)| {
            HashedFingerprint::new(
                sequence,
                cfg.start_at(sequence),
                cfg.end_at(sequence),
                signature.clone(),
                &cfg.hashing,
            )
        })
        .collect()
}

/// Register a track and store the fingerprints of its signatures.
pub fn index_track(
    store: &InMemoryModelStore,
    info: TrackInfo,
    signatures: &[Vec<u8>],
    cfg: &FingerprintConfiguration,
) -> Result<TrackReference, EngineError> {
    let fingerprints = hash_signatures(signatures, 0, cfg)?;
    let track = store.insert_track(info);
    if let Err(err) = store.insert_hashed_fingerprints(&track, fingerprints) {
        // Leave no half-indexed track behind.
        let _ = store.delete_track(&track);
        warn!(track = %track, error = %err, "track_index_failure");
        return Err(err.into());
    }
    info!(track = %track, fingerprints = signatures.len(), "track_indexed");
    Ok(track)
}

/// Hash the query signatures and match them against the store.
pub fn identify<S: ModelStore>(
    matcher: &Matcher<S>,
    signatures: &[Vec<u8>],
    cfg: &QueryConfiguration,
) -> Result<QueryResult, EngineError> {
    let fingerprints = hash_signatures(signatures, 0, &cfg.fingerprint)?;
    Ok(matcher.query(&fingerprints, cfg)?)
}

/// Deterministic pseudo-random signatures for demos, tests, and benches.
///
/// The same `seed` always yields the same signatures; different seeds yield
/// signatures that share no bands in practice.
pub fn synthetic_signatures(seed: u64, count: usize, hashing: &HashingConfig) -> Vec<Vec<u8>> {
    let len = hashing.signature_len();
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ 0xD1B5_4A32_D192_ED03;
    (0..count)
        .map(|_| {
            (0..len)
                .map(|_| {
                    state = splitmix64(state);
                    (state >> 56) as u8
                })
                .collect()
        })
        .collect()
}

fn splitmix64(state: u64) -> u64 {
    let mut z = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
