//! Candidate retrieval.
//!
//! A query reaches the store either one fingerprint at a time
//! ([`RetrievalStrategy::NonBatched`]) or in a single bulk read
//! ([`RetrievalStrategy::Batched`]). The choice is made once per query from
//! [`ModelStore::supports_batched_query`]; both paths fill the same
//! [`AccumulatorMap`].

use std::sync::Arc;

use fingerprint::{HashedFingerprint, SubFingerprint};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use store::ModelStore;

use crate::similarity::{AccumulatorMap, SimilarityAccumulator};
use crate::types::{MatchError, QueryConfiguration};
use crate::votes::passes_threshold_votes;

/// How candidates are read from the store for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// One store read per query fingerprint; the store applies the vote
    /// threshold.
    NonBatched,
    /// One store read for the whole query; the vote threshold is applied
    /// per query fingerprint after the read.
    Batched,
}

impl RetrievalStrategy {
    pub fn for_store<S: ModelStore + ?Sized>(store: &S) -> Self {
        if store.supports_batched_query() {
            RetrievalStrategy::Batched
        } else {
            RetrievalStrategy::NonBatched
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalStrategy::NonBatched => "non_batched",
            RetrievalStrategy::Batched => "batched",
        }
    }

    /// Retrieve candidates for every query fingerprint and accumulate them.
    ///
    /// Fingerprints are processed in parallel; the first store error aborts
    /// the query and partial accumulations are dropped.
    pub fn collect<S, A>(
        &self,
        store: &S,
        accumulator: &A,
        fingerprints: &[HashedFingerprint],
        cfg: &QueryConfiguration,
    ) -> Result<AccumulatorMap, MatchError>
    where
        S: ModelStore + ?Sized,
        A: SimilarityAccumulator,
    {
        match self {
            RetrievalStrategy::NonBatched => {
                collect_non_batched(store, accumulator, fingerprints, cfg)
            }
            RetrievalStrategy::Batched => collect_batched(store, accumulator, fingerprints, cfg),
        }
    }
}

fn collect_non_batched<S, A>(
    store: &S,
    accumulator: &A,
    fingerprints: &[HashedFingerprint],
    cfg: &QueryConfiguration,
) -> Result<AccumulatorMap, MatchError>
where
    S: ModelStore + ?Sized,
    A: SimilarityAccumulator,
{
    let accumulators = AccumulatorMap::new();
    let store_query = cfg.store_query();
    let min_hashes = cfg.fingerprint.hashing.min_hashes_per_table;

    fingerprints.par_iter().try_for_each(|fingerprint| {
        let candidates = store.read_sub_fingerprints(&fingerprint.hash_buckets, &store_query)?;
        accumulator.accumulate(candidates, fingerprint, &accumulators, min_hashes);
        Ok::<(), MatchError>(())
    })?;

    Ok(accumulators)
}

fn collect_batched<S, A>(
    store: &S,
    accumulator: &A,
    fingerprints: &[HashedFingerprint],
    cfg: &QueryConfiguration,
) -> Result<AccumulatorMap, MatchError>
where
    S: ModelStore + ?Sized,
    A: SimilarityAccumulator,
{
    let accumulators = AccumulatorMap::new();
    if fingerprints.is_empty() {
        return Ok(accumulators);
    }

    let buckets: Vec<&[u64]> = fingerprints
        .iter()
        .map(|fingerprint| fingerprint.hash_buckets.as_slice())
        .collect();
    let candidates: Vec<Arc<SubFingerprint>> =
        store.read_sub_fingerprints_batch(&buckets, &cfg.store_query())?;
    let threshold = cfg.threshold_votes;
    let min_hashes = cfg.fingerprint.hashing.min_hashes_per_table;

    fingerprints.par_iter().for_each(|fingerprint| {
        let passing = candidates
            .iter()
            .filter(|candidate| passes_threshold_votes(fingerprint, candidate, threshold))
            .cloned();
        accumulator.accumulate(passing, fingerprint, &accumulators, min_hashes);
    });

    Ok(accumulators)
}
