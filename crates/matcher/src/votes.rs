use fingerprint::{HashedFingerprint, SubFingerprint};

/// Number of hash tables in which `query` and `candidate` fall into the same
/// bucket. Tables are compared positionally; extra tables on either side
/// never vote.
#[inline]
pub fn count_votes(query: &HashedFingerprint, candidate: &SubFingerprint) -> usize {
    query
        .hash_buckets
        .iter()
        .zip(&candidate.hash_buckets)
        .filter(|(q, c)| q == c)
        .count()
}

/// Whether `candidate` shares at least `threshold_votes` buckets with `query`.
#[inline]
pub fn passes_threshold_votes(
    query: &HashedFingerprint,
    candidate: &SubFingerprint,
    threshold_votes: usize,
) -> bool {
    count_votes(query, candidate) >= threshold_votes
}
