use fingerprint::{FingerprintConfiguration, TrackData, TrackReference};
use serde::{Deserialize, Serialize};
use store::{StoreError, StoreQuery};
use thiserror::Error;

/// Configuration for a single query.
///
/// `QueryConfiguration` is cheap to clone and serde-friendly so it can be
/// embedded in higher-level configs or shipped across process boundaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryConfiguration {
    /// Maximum number of tracks returned to the caller.
    #[serde(default = "QueryConfiguration::default_max_tracks_to_return")]
    pub max_tracks_to_return: usize,
    /// Minimum number of identical hash-table buckets for a stored
    /// sub-fingerprint to count as a candidate for a query fingerprint.
    #[serde(default = "QueryConfiguration::default_threshold_votes")]
    pub threshold_votes: usize,
    /// Optional cap on candidates the store returns per query fingerprint
    /// (single-fingerprint lookups only).
    #[serde(default)]
    pub max_candidates_per_fingerprint: Option<usize>,
    /// Largest step, in fingerprints, allowed between two consecutive
    /// matches of an alignment, on either the query or the track side.
    #[serde(default = "QueryConfiguration::default_max_alignment_gap")]
    pub max_alignment_gap: u32,
    /// Tracks whose best alignment is shorter than this are discarded.
    #[serde(default = "QueryConfiguration::default_min_aligned_matches")]
    pub min_aligned_matches: usize,
    /// Timing and hashing layout of the fingerprints being matched.
    #[serde(default)]
    pub fingerprint: FingerprintConfiguration,
}

impl QueryConfiguration {
    pub(crate) fn default_max_tracks_to_return() -> usize {
        25
    }

    pub(crate) fn default_threshold_votes() -> usize {
        5
    }

    pub(crate) fn default_max_alignment_gap() -> u32 {
        5
    }

    pub(crate) fn default_min_aligned_matches() -> usize {
        2
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tracks_to_return(mut self, max_tracks: usize) -> Self {
        self.max_tracks_to_return = max_tracks;
        self
    }

    pub fn with_threshold_votes(mut self, threshold_votes: usize) -> Self {
        self.threshold_votes = threshold_votes;
        self
    }

    pub fn with_max_candidates_per_fingerprint(mut self, max: Option<usize>) -> Self {
        self.max_candidates_per_fingerprint = max;
        self
    }

    pub fn with_max_alignment_gap(mut self, gap: u32) -> Self {
        self.max_alignment_gap = gap;
        self
    }

    pub fn with_min_aligned_matches(mut self, min: usize) -> Self {
        self.min_aligned_matches = min;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: FingerprintConfiguration) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Store-side view of this configuration.
    pub fn store_query(&self) -> StoreQuery {
        StoreQuery::new(self.threshold_votes)
            .with_max_candidates(self.max_candidates_per_fingerprint)
    }

    /// Validate the configuration for a single query.
    pub fn validate(&self) -> Result<(), MatchError> {
        self.fingerprint
            .validate()
            .map_err(|err| MatchError::InvalidConfig(err.to_string()))?;
        if self.max_tracks_to_return == 0 {
            return Err(MatchError::InvalidConfig(
                "max_tracks_to_return must be greater than zero".into(),
            ));
        }
        if self.threshold_votes == 0 {
            return Err(MatchError::InvalidConfig(
                "threshold_votes must be greater than zero".into(),
            ));
        }
        let hash_tables = self.fingerprint.hashing.hash_tables;
        if self.threshold_votes > hash_tables {
            return Err(MatchError::InvalidConfig(format!(
                "threshold_votes ({}) cannot exceed hash_tables ({hash_tables})",
                self.threshold_votes
            )));
        }
        if self.max_candidates_per_fingerprint == Some(0) {
            return Err(MatchError::InvalidConfig(
                "max_candidates_per_fingerprint must be greater than zero when set".into(),
            ));
        }
        if self.max_alignment_gap == 0 {
            return Err(MatchError::InvalidConfig(
                "max_alignment_gap must be greater than zero".into(),
            ));
        }
        if self.min_aligned_matches == 0 {
            return Err(MatchError::InvalidConfig(
                "min_aligned_matches must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for QueryConfiguration {
    fn default() -> Self {
        Self {
            max_tracks_to_return: Self::default_max_tracks_to_return(),
            threshold_votes: Self::default_threshold_votes(),
            max_candidates_per_fingerprint: None,
            max_alignment_gap: Self::default_max_alignment_gap(),
            min_aligned_matches: Self::default_min_aligned_matches(),
            fingerprint: FingerprintConfiguration::default(),
        }
    }
}

/// One ranked track returned by a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultEntry {
    /// Stored track record.
    pub track: TrackData,
    /// Fraction of query fingerprints taking part in the best alignment.
    pub confidence: f64,
    /// Fraction of the query duration explained by the best alignment.
    pub coverage: f64,
    /// Number of matches in the best alignment.
    pub aligned_matches: usize,
    /// Number of matches accumulated for the track before alignment.
    pub total_matches: usize,
    /// Smallest Hamming distance seen for this track.
    pub min_hamming_distance: u32,
    /// Matched range within the query, in seconds.
    pub query_match_starts_at: f64,
    pub query_match_ends_at: f64,
    /// Matched range within the track, in seconds.
    pub track_match_starts_at: f64,
    pub track_match_ends_at: f64,
}

impl ResultEntry {
    pub fn reference(&self) -> TrackReference {
        self.track.reference
    }

    pub fn query_match_length(&self) -> f64 {
        self.query_match_ends_at - self.query_match_starts_at
    }
}

/// Ranked matches plus diagnostic counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryMatches {
    /// Entries ordered by confidence, then coverage, then track reference.
    pub entries: Vec<ResultEntry>,
    /// Distinct tracks that received at least one candidate match.
    pub tracks_analyzed: usize,
    /// Total match records accumulated across all tracks.
    pub sub_fingerprints_analyzed: usize,
}

/// Outcome of a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryResult {
    /// No candidate track survived retrieval, filtering, and alignment.
    Empty,
    /// At least one track matched.
    Matches(QueryMatches),
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        matches!(self, QueryResult::Empty)
    }

    pub fn entries(&self) -> &[ResultEntry] {
        match self {
            QueryResult::Empty => &[],
            QueryResult::Matches(matches) => &matches.entries,
        }
    }

    pub fn best_match(&self) -> Option<&ResultEntry> {
        self.entries().first()
    }

    pub fn tracks_analyzed(&self) -> usize {
        match self {
            QueryResult::Empty => 0,
            QueryResult::Matches(matches) => matches.tracks_analyzed,
        }
    }

    pub fn sub_fingerprints_analyzed(&self) -> usize {
        match self {
            QueryResult::Empty => 0,
            QueryResult::Matches(matches) => matches.sub_fingerprints_analyzed,
        }
    }
}

/// Errors produced by the matching layer.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Invalid per-query configuration.
    #[error("invalid query config: {0}")]
    InvalidConfig(String),
    /// Two query fingerprints share a sequence number.
    #[error("duplicate query sequence number {0}")]
    DuplicateSequence(u32),
    /// Model store read failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
