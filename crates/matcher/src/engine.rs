use std::collections::HashSet;
use std::time::Instant;

use fingerprint::HashedFingerprint;
use store::ModelStore;
use tracing::{info, warn, Level};

use crate::metrics::metrics_recorder;
use crate::selector::{AlignmentSelector, CandidateSelector};
use crate::similarity::{HammingSimilarity, SimilarityAccumulator};
use crate::strategy::RetrievalStrategy;
use crate::types::{MatchError, QueryConfiguration, QueryMatches, QueryResult};


/// Query matcher over a fingerprint model store.
///
/// A `Matcher` owns its store handle and its two collaborators: the
/// similarity accumulator that records candidate matches and the selector
/// that aligns, scores, and ranks them. It holds no per-query state, so one
/// instance can serve any number of concurrent queries.
pub struct Matcher<S, A = HammingSimilarity, C = AlignmentSelector> {
    store: S,
    accumulator: A,
    selector: C,
}

impl<S: ModelStore> Matcher<S> {
    /// Construct a matcher with the default Hamming accumulator and
    /// alignment selector.
    pub fn new(store: S) -> Self {
        Self::with_collaborators(store, HammingSimilarity, AlignmentSelector)
    }
}

impl<S, A, C> Matcher<S, A, C>
where
    S: ModelStore,
    A: SimilarityAccumulator,
    C: CandidateSelector,
{
    /// Construct a matcher with explicit collaborators.
    pub fn with_collaborators(store: S, accumulator: A, selector: C) -> Self {
        Self {
            store,
            accumulator,
            selector,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Strategy the next query will use, as advertised by the store.
    pub fn strategy(&self) -> RetrievalStrategy {
        RetrievalStrategy::for_store(&self.store)
    }

    /// Match a sequence of query fingerprints against the store.
    ///
    /// Query fingerprints must carry distinct sequence numbers, since matches
    /// are recorded per (sequence number, sub-fingerprint).
    ///
    /// Returns [`QueryResult::Empty`] when no candidate survives retrieval or
    /// selection. Store failures surface as [`MatchError::Store`]; no partial
    /// result is ever returned.
    pub fn query(
        &self,
        fingerprints: &[HashedFingerprint],
        cfg: &QueryConfiguration,
    ) -> Result<QueryResult, MatchError> {
        let start = Instant::now();
        let strategy = self.strategy();

        if let Err(err) = cfg
            .validate()
            .and_then(|()| unique_sequence_numbers(fingerprints))
        {
            let elapsed_micros = start.elapsed().as_micros();
            warn!(error = %err, elapsed_micros, "query_failure");
            return Err(err);
        }

        let span = tracing::span!(
            Level::INFO,
            "matcher.query",
            fingerprints = fingerprints.len(),
            strategy = strategy.as_str()
        );
        let _guard = span.enter();

        match self.query_inner(strategy, fingerprints, cfg) {
            Ok(result) => {
                let latency = start.elapsed();
                let hit_count = result.entries().len();
                let tracks_analyzed = result.tracks_analyzed();
                if result.is_empty() {
                    info!(elapsed_micros = latency.as_micros(), "query_no_match");
                } else {
                    info!(
                        hit_count,
                        tracks_analyzed,
                        sub_fingerprints_analyzed = result.sub_fingerprints_analyzed(),
                        elapsed_micros = latency.as_micros(),
                        "query_success"
                    );
                }
                if let Some(recorder) = metrics_recorder() {
                    recorder.record_query(strategy, latency, tracks_analyzed, hit_count);
                }
                Ok(result)
            }
            Err(err) => {
                let latency = start.elapsed();
                warn!(error = %err, elapsed_micros = latency.as_micros(), "query_failure");
                if let Some(recorder) = metrics_recorder() {
                    recorder.record_failure(strategy, latency);
                }
                Err(err)
            }
        }
    }

    fn query_inner(
        &self,
        strategy: RetrievalStrategy,
        fingerprints: &[HashedFingerprint],
        cfg: &QueryConfiguration,
    ) -> Result<QueryResult, MatchError> {
        let accumulators = strategy.collect(&self.store, &self.accumulator, fingerprints, cfg)?;
        if accumulators.is_empty() {
            return Ok(QueryResult::Empty);
        }

        let tracks_analyzed = accumulators.len();
        let sub_fingerprints_analyzed = accumulators.iter().map(|entry| entry.value().len()).sum();

        let entries = self
            .selector
            .select_best(fingerprints, &accumulators, cfg, &self.store)?;
        Ok(match entries {
            Some(entries) => QueryResult::Matches(QueryMatches {
                entries,
                tracks_analyzed,
                sub_fingerprints_analyzed,
            }),
            None => QueryResult::Empty,
        })
    }
}

fn unique_sequence_numbers(fingerprints: &[HashedFingerprint]) -> Result<(), MatchError> {
    let mut seen = HashSet::with_capacity(fingerprints.len());
    for fingerprint in fingerprints {
        if !seen.insert(fingerprint.sequence_number) {
            return Err(MatchError::DuplicateSequence(fingerprint.sequence_number));
        }
    }
    Ok(())
}
