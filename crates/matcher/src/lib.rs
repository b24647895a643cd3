//! # Audio Matcher (`matcher`)
//!
//! ## Purpose
//!
//! `matcher` answers the question "which indexed tracks does this audio
//! snippet come from?". It takes the hashed fingerprints of a query, pulls
//! candidate sub-fingerprints from a [`store::ModelStore`], groups them per
//! track, and ranks the tracks whose matches line up in time with the query.
//!
//! A query runs in three stages:
//! - **Retrieval**: a [`RetrievalStrategy`] reads candidates either one query
//!   fingerprint at a time or in a single batch, chosen from
//!   [`store::ModelStore::supports_batched_query`]. Fingerprints are processed
//!   in parallel on the rayon pool.
//! - **Accumulation**: a [`SimilarityAccumulator`] scores every accepted
//!   candidate (Hamming distance over the hashed signature prefix) and records
//!   it in a concurrent per-track [`AccumulatorMap`].
//! - **Selection**: a [`CandidateSelector`] finds each track's longest
//!   time-consistent alignment, computes confidence and coverage, drops weak
//!   tracks, and returns the best ones in a deterministic order.
//!
//! ## Core Types
//!
//! - [`QueryConfiguration`]: per-query knobs (`max_tracks_to_return`,
//!   `threshold_votes`, alignment limits, fingerprint layout).
//! - [`ResultEntry`]: one ranked track with its confidence, coverage, and
//!   matched time ranges.
//! - [`QueryResult`]: either [`QueryResult::Empty`] or the ranked entries
//!   plus diagnostic counters.
//! - [`Matcher`]: the query entry point, generic over store and collaborators.
//!
//! ## Example Usage
//!
//! ```
//! use fingerprint::{FingerprintConfiguration, HashedFingerprint, HashingConfig, TrackInfo};
//! use matcher::{Matcher, QueryConfiguration};
//! use store::InMemoryModelStore;
//!
//! let hashing = HashingConfig::new(4, 2);
//! let fingerprint_cfg = FingerprintConfiguration::default().with_hashing(hashing);
//!
//! let store = InMemoryModelStore::new();
//! let track = store.insert_track(TrackInfo::new("Artist", "Title", 30.0));
//! let fingerprints: Vec<HashedFingerprint> = (0..8u32)
//!     .map(|seq| {
//!         let signature: Vec<u8> = (0..8).map(|i| (seq * 8 + i) as u8).collect();
//!         HashedFingerprint::new(
//!             seq,
//!             fingerprint_cfg.start_at(seq),
//!             fingerprint_cfg.end_at(seq),
//!             signature,
//!             &hashing,
//!         )
//!         .unwrap()
//!     })
//!     .collect();
//! store.insert_hashed_fingerprints(&track, fingerprints.clone()).unwrap();
//!
//! let matcher = Matcher::new(store);
//! let cfg = QueryConfiguration::default()
//!     .with_fingerprint(fingerprint_cfg)
//!     .with_threshold_votes(4);
//! let result = matcher.query(&fingerprints[2..6], &cfg).unwrap();
//!
//! let best = result.best_match().expect("snippet should match its source");
//! assert_eq!(best.reference(), track);
//! assert_eq!(best.aligned_matches, 4);
//! ```

mod engine;
mod metrics;
mod selector;
mod similarity;
mod strategy;
mod types;
mod votes;

pub use crate::engine::Matcher;
pub use crate::metrics::{set_match_metrics, MatchMetrics};
pub use crate::selector::{best_alignment, AlignmentSelector, CandidateSelector};
pub use crate::similarity::{
    AccumulatorMap, HammingSimilarity, MatchedWith, ResultEntryAccumulator, SimilarityAccumulator,
};
pub use crate::strategy::RetrievalStrategy;
pub use crate::types::{MatchError, QueryConfiguration, QueryMatches, QueryResult, ResultEntry};
pub use crate::votes::{count_votes, passes_threshold_votes};
