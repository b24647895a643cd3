//! Best-candidate selection.
//!
//! For every accumulated track the selector finds the longest chain of
//! matches that advances through the query and the track together, scores
//! the track from that chain, and ranks the survivors.

use std::cmp::Ordering;

use fingerprint::{FingerprintConfiguration, HashedFingerprint, TrackData, TrackReference};
use store::ModelStore;
use tracing::{debug, warn};

use crate::similarity::{AccumulatorMap, MatchedWith, ResultEntryAccumulator};
use crate::types::{MatchError, QueryConfiguration, ResultEntry};

/// Turns accumulated matches into a ranked, truncated result list.
pub trait CandidateSelector: Send + Sync {
    /// Returns `None` when no track survives scoring.
    fn select_best(
        &self,
        query: &[HashedFingerprint],
        accumulators: &AccumulatorMap,
        cfg: &QueryConfiguration,
        store: &dyn ModelStore,
    ) -> Result<Option<Vec<ResultEntry>>, MatchError>;
}

/// Default selector scoring tracks by their longest time-consistent alignment.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlignmentSelector;

impl CandidateSelector for AlignmentSelector {
    fn select_best(
        &self,
        query: &[HashedFingerprint],
        accumulators: &AccumulatorMap,
        cfg: &QueryConfiguration,
        store: &dyn ModelStore,
    ) -> Result<Option<Vec<ResultEntry>>, MatchError> {
        if query.is_empty() || accumulators.is_empty() {
            return Ok(None);
        }

        let query_duration = query_duration(query, &cfg.fingerprint);
        let mut scored: Vec<ScoredTrack> = accumulators
            .iter()
            .filter_map(|entry| {
                score_track(*entry.key(), entry.value(), query.len(), query_duration, cfg)
            })
            .collect();
        scored.sort_by(rank_order);

        let mut entries = Vec::with_capacity(scored.len().min(cfg.max_tracks_to_return));
        for candidate in scored {
            if entries.len() == cfg.max_tracks_to_return {
                break;
            }
            match store.read_track(&candidate.reference)? {
                Some(track) => entries.push(candidate.into_entry(track)),
                None => warn!(track = %candidate.reference, "track_missing_in_store"),
            }
        }

        if entries.is_empty() {
            Ok(None)
        } else {
            Ok(Some(entries))
        }
    }
}

/// Longest chain of matches in which every step moves forward in the query,
/// never backwards in the track, and by at most `max_gap` fingerprints on
/// either side.
///
/// Ties between equally long chains resolve to the one ending earliest in
/// (query sequence, track sequence) order.
pub fn best_alignment(accumulator: &ResultEntryAccumulator, max_gap: u32) -> Vec<&MatchedWith> {
    let mut matches: Vec<&MatchedWith> = accumulator.matches().collect();
    if matches.is_empty() {
        return matches;
    }
    matches.sort_by_key(|m| (m.query_sequence, m.track_sequence(), m.sub_fingerprint.id));

    let n = matches.len();
    let mut length = vec![1usize; n];
    let mut previous: Vec<Option<usize>> = vec![None; n];
    for j in 1..n {
        let (qj, tj) = (matches[j].query_sequence, matches[j].track_sequence());
        for i in (0..j).rev() {
            let (qi, ti) = (matches[i].query_sequence, matches[i].track_sequence());
            let dq = qj - qi;
            if dq > max_gap {
                break;
            }
            if dq == 0 || tj < ti || tj - ti > max_gap {
                continue;
            }
            if length[i] + 1 > length[j] {
                length[j] = length[i] + 1;
                previous[j] = Some(i);
            }
        }
    }

    let mut end = 0;
    for j in 1..n {
        if length[j] > length[end] {
            end = j;
        }
    }

    let mut chain = Vec::with_capacity(length[end]);
    let mut cursor = Some(end);
    while let Some(i) = cursor {
        chain.push(matches[i]);
        cursor = previous[i];
    }
    chain.reverse();
    chain
}

/// Length of the query in seconds, falling back to one frame per fingerprint
/// when timestamps do not describe a positive span.
fn query_duration(query: &[HashedFingerprint], fingerprint: &FingerprintConfiguration) -> f64 {
    let start = query.iter().map(|f| f.start_at).fold(f64::INFINITY, f64::min);
    let end = query.iter().map(|f| f.end_at).fold(f64::NEG_INFINITY, f64::max);
    let span = end - start;
    if span.is_finite() && span > 0.0 {
        span
    } else {
        query.len() as f64 * fingerprint.frame_duration()
    }
}

/// Seconds of the query covered by the aligned fingerprints. Overlapping
/// fingerprints count once.
fn covered_length(chain: &[&MatchedWith]) -> f64 {
    let mut covered = 0.0;
    let mut reach = f64::NEG_INFINITY;
    for m in chain {
        if m.query_ends_at <= reach {
            continue;
        }
        covered += m.query_ends_at - m.query_starts_at.max(reach);
        reach = m.query_ends_at;
    }
    covered
}

#[derive(Debug)]
struct ScoredTrack {
    reference: TrackReference,
    confidence: f64,
    coverage: f64,
    aligned_matches: usize,
    total_matches: usize,
    min_hamming_distance: u32,
    query_range: (f64, f64),
    track_range: (f64, f64),
}

impl ScoredTrack {
    fn into_entry(self, track: TrackData) -> ResultEntry {
        ResultEntry {
            track,
            confidence: self.confidence,
            coverage: self.coverage,
            aligned_matches: self.aligned_matches,
            total_matches: self.total_matches,
            min_hamming_distance: self.min_hamming_distance,
            query_match_starts_at: self.query_range.0,
            query_match_ends_at: self.query_range.1,
            track_match_starts_at: self.track_range.0,
            track_match_ends_at: self.track_range.1,
        }
    }
}

fn score_track(
    reference: TrackReference,
    accumulator: &ResultEntryAccumulator,
    query_len: usize,
    query_duration: f64,
    cfg: &QueryConfiguration,
) -> Option<ScoredTrack> {
    let chain = best_alignment(accumulator, cfg.max_alignment_gap);
    let aligned = chain.len();
    if aligned == 0 || aligned < cfg.min_aligned_matches {
        debug!(
            track = %reference,
            aligned_matches = aligned,
            min_aligned_matches = cfg.min_aligned_matches,
            "track_discarded"
        );
        return None;
    }
    let first = chain[0];
    let last = chain[aligned - 1];

    let confidence = (aligned as f64 / query_len as f64).clamp(0.0, 1.0);
    let mut covered = covered_length(&chain);
    if !(covered > 0.0) {
        covered = aligned as f64 * cfg.fingerprint.frame_duration();
    }
    let coverage = (covered / query_duration).clamp(0.0, 1.0);

    Some(ScoredTrack {
        reference,
        confidence,
        coverage,
        aligned_matches: aligned,
        total_matches: accumulator.len(),
        min_hamming_distance: accumulator.min_hamming_distance().unwrap_or(0),
        query_range: (first.query_starts_at, last.query_ends_at),
        track_range: (first.sub_fingerprint.start_at, last.sub_fingerprint.end_at),
    })
}

fn rank_order(a: &ScoredTrack, b: &ScoredTrack) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.coverage.total_cmp(&a.coverage))
        .then_with(|| a.reference.cmp(&b.reference))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fingerprint::{SubFingerprint, SubFingerprintId, TrackInfo};
    use store::InMemoryModelStore;

    fn query_fp(sequence: u32) -> HashedFingerprint {
        HashedFingerprint::from_parts(
            sequence,
            f64::from(sequence),
            f64::from(sequence) + 1.0,
            vec![0; 4],
            vec![1, 2],
        )
    }

    fn stored(id: u64, track: TrackReference, sequence: u32) -> Arc<SubFingerprint> {
        Arc::new(SubFingerprint::from_hashed(
            SubFingerprintId::new(id),
            track,
            HashedFingerprint::from_parts(
                sequence,
                f64::from(sequence) * 2.0,
                f64::from(sequence) * 2.0 + 1.0,
                vec![0; 4],
                vec![1, 2],
            ),
        ))
    }

    fn accumulator(track: TrackReference, pairs: &[(u32, u32)]) -> ResultEntryAccumulator {
        let mut acc = ResultEntryAccumulator::new();
        for (id, &(q, t)) in pairs.iter().enumerate() {
            acc.add(&query_fp(q), stored(id as u64, track, t), 1);
        }
        acc
    }

    fn cfg() -> QueryConfiguration {
        QueryConfiguration::default()
            .with_fingerprint(FingerprintConfiguration::default().with_fingerprint_length(1.0))
            .with_max_alignment_gap(2)
            .with_min_aligned_matches(1)
    }

    fn sequences(chain: &[&MatchedWith]) -> Vec<(u32, u32)> {
        chain
            .iter()
            .map(|m| (m.query_sequence, m.track_sequence()))
            .collect()
    }

    #[test]
    fn alignment_follows_diagonal() {
        let acc = accumulator(TrackReference::new(1), &[(0, 10), (1, 11), (2, 12)]);
        let chain = best_alignment(&acc, 2);
        assert_eq!(sequences(&chain), vec![(0, 10), (1, 11), (2, 12)]);
    }

    #[test]
    fn reversed_matches_align_only_once() {
        let acc = accumulator(TrackReference::new(1), &[(0, 2), (1, 1), (2, 0)]);
        assert_eq!(best_alignment(&acc, 5).len(), 1);
    }

    #[test]
    fn alignment_skips_outliers() {
        // (1, 40) is a spurious hit far from the diagonal.
        let acc = accumulator(
            TrackReference::new(1),
            &[(0, 5), (1, 40), (1, 6), (2, 7), (3, 8)],
        );
        let chain = best_alignment(&acc, 2);
        assert_eq!(sequences(&chain), vec![(0, 5), (1, 6), (2, 7), (3, 8)]);
    }

    #[test]
    fn gap_limit_breaks_chains() {
        let acc = accumulator(TrackReference::new(1), &[(0, 0), (1, 1), (5, 5), (6, 6), (7, 7)]);
        let chain = best_alignment(&acc, 2);
        assert_eq!(sequences(&chain), vec![(5, 5), (6, 6), (7, 7)]);

        let wide = best_alignment(&acc, 4);
        assert_eq!(wide.len(), 5);
    }

    #[test]
    fn empty_accumulator_has_no_alignment() {
        assert!(best_alignment(&ResultEntryAccumulator::new(), 3).is_empty());
    }

    fn store_with_tracks(count: usize) -> (InMemoryModelStore, Vec<TrackReference>) {
        let store = InMemoryModelStore::new();
        let refs = (0..count)
            .map(|i| store.insert_track(TrackInfo::new("Artist", format!("Song {i}"), 30.0)))
            .collect();
        (store, refs)
    }

    fn query(len: u32) -> Vec<HashedFingerprint> {
        (0..len).map(query_fp).collect()
    }

    #[test]
    fn full_alignment_scores_one() {
        let (store, refs) = store_with_tracks(1);
        let map = AccumulatorMap::new();
        map.insert(refs[0], accumulator(refs[0], &[(0, 3), (1, 4), (2, 5)]));

        let entries = AlignmentSelector
            .select_best(&query(3), &map, &cfg(), &store)
            .unwrap()
            .expect("track should be selected");
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.reference(), refs[0]);
        assert_eq!(entry.confidence, 1.0);
        assert_eq!(entry.coverage, 1.0);
        assert_eq!(entry.aligned_matches, 3);
        assert_eq!(entry.min_hamming_distance, 1);
        assert_eq!(entry.query_match_starts_at, 0.0);
        assert_eq!(entry.query_match_ends_at, 3.0);
        assert_eq!(entry.track_match_starts_at, 6.0);
        assert_eq!(entry.track_match_ends_at, 11.0);
        assert_eq!(entry.track.info.title, "Song 0");
    }

    #[test]
    fn ranking_orders_by_confidence_then_reference() {
        let (store, refs) = store_with_tracks(3);
        let map = AccumulatorMap::new();
        map.insert(refs[0], accumulator(refs[0], &[(0, 0)]));
        map.insert(refs[1], accumulator(refs[1], &[(0, 0), (1, 1), (2, 2), (3, 3)]));
        map.insert(refs[2], accumulator(refs[2], &[(2, 0)]));

        let entries = AlignmentSelector
            .select_best(&query(4), &map, &cfg(), &store)
            .unwrap()
            .unwrap();
        let order: Vec<_> = entries.iter().map(ResultEntry::reference).collect();
        assert_eq!(order, vec![refs[1], refs[0], refs[2]]);
        assert!((entries[1].confidence - 0.25).abs() < 1e-9);
    }

    #[test]
    fn equal_confidence_ranks_by_coverage() {
        let (store, refs) = store_with_tracks(2);
        // One second frames every half second; the query spans 3.5s.
        let overlapping: Vec<_> = (0..6u32)
            .map(|seq| {
                let start = f64::from(seq) * 0.5;
                HashedFingerprint::from_parts(seq, start, start + 1.0, vec![0; 4], vec![1, 2])
            })
            .collect();
        let aligned_on = |track: TrackReference, sequences: [u32; 2]| {
            let mut acc = ResultEntryAccumulator::new();
            for seq in sequences {
                let fp = &overlapping[seq as usize];
                acc.add(fp, stored(u64::from(seq), track, seq), 0);
            }
            acc
        };

        let map = AccumulatorMap::new();
        // Adjacent frames overlap and cover [0, 1.5]; spread frames cover [0, 2].
        map.insert(refs[0], aligned_on(refs[0], [0, 1]));
        map.insert(refs[1], aligned_on(refs[1], [0, 2]));

        let entries = AlignmentSelector
            .select_best(&overlapping, &map, &cfg(), &store)
            .unwrap()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].confidence, entries[1].confidence);
        assert_eq!(entries[0].reference(), refs[1]);
        assert_eq!(entries[1].reference(), refs[0]);
        assert!((entries[0].coverage - 2.0 / 3.5).abs() < 1e-9);
        assert!((entries[1].coverage - 1.5 / 3.5).abs() < 1e-9);
    }

    #[test]
    fn results_are_truncated() {
        let (store, refs) = store_with_tracks(4);
        let map = AccumulatorMap::new();
        for r in &refs {
            map.insert(*r, accumulator(*r, &[(0, 0), (1, 1)]));
        }
        let entries = AlignmentSelector
            .select_best(&query(2), &map, &cfg().with_max_tracks_to_return(2), &store)
            .unwrap()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].reference(), refs[0]);
        assert_eq!(entries[1].reference(), refs[1]);
    }

    #[test]
    fn short_alignments_are_discarded() {
        let (store, refs) = store_with_tracks(1);
        let map = AccumulatorMap::new();
        map.insert(refs[0], accumulator(refs[0], &[(0, 2), (1, 1), (2, 0)]));

        let kept = AlignmentSelector
            .select_best(&query(3), &map, &cfg().with_min_aligned_matches(1), &store)
            .unwrap()
            .unwrap();
        assert!((kept[0].confidence - 1.0 / 3.0).abs() < 1e-9);

        let dropped = AlignmentSelector
            .select_best(&query(3), &map, &cfg().with_min_aligned_matches(2), &store)
            .unwrap();
        assert!(dropped.is_none());
    }

    #[test]
    fn tracks_missing_from_store_are_skipped() {
        let (store, refs) = store_with_tracks(1);
        let ghost = TrackReference::new(9_999);
        let map = AccumulatorMap::new();
        map.insert(ghost, accumulator(ghost, &[(0, 0), (1, 1), (2, 2)]));
        map.insert(refs[0], accumulator(refs[0], &[(0, 0)]));

        let entries = AlignmentSelector
            .select_best(&query(3), &map, &cfg(), &store)
            .unwrap()
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reference(), refs[0]);
    }

    #[test]
    fn overlapping_fingerprints_cover_their_union() {
        let (store, refs) = store_with_tracks(1);
        let map = AccumulatorMap::new();
        // Frames one second long every half second.
        let overlapping: Vec<_> = (0..4u32)
            .map(|seq| {
                let start = f64::from(seq) * 0.5;
                HashedFingerprint::from_parts(seq, start, start + 1.0, vec![0; 4], vec![1, 2])
            })
            .collect();
        let mut acc = ResultEntryAccumulator::new();
        for fp in &overlapping[..2] {
            acc.add(fp, stored(u64::from(fp.sequence_number), refs[0], fp.sequence_number), 0);
        }
        map.insert(refs[0], acc);

        let entries = AlignmentSelector
            .select_best(&overlapping, &map, &cfg(), &store)
            .unwrap()
            .unwrap();
        // Query spans 2.5s, the two aligned frames cover [0, 1.5].
        assert!((entries[0].coverage - 0.6).abs() < 1e-9);
        assert!((entries[0].confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn coverage_falls_back_to_frame_count() {
        let (store, refs) = store_with_tracks(1);
        let map = AccumulatorMap::new();
        map.insert(refs[0], accumulator(refs[0], &[(0, 0)]));
        // Untimed query fingerprints: every timestamp is zero.
        let untimed: Vec<_> = (0..4)
            .map(|seq| HashedFingerprint::from_parts(seq, 0.0, 0.0, vec![0; 4], vec![1, 2]))
            .collect();

        let entries = AlignmentSelector
            .select_best(&untimed, &map, &cfg(), &store)
            .unwrap()
            .unwrap();
        assert!((entries[0].coverage - 0.25).abs() < 1e-9);
    }
}
