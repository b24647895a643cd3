use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use fingerprint::{
    HashedFingerprint, SubFingerprint, SubFingerprintId, TrackData, TrackInfo, TrackReference,
};
use hashbrown::HashMap;
use tracing::debug;

use crate::{ModelStore, StoreError, StoreQuery};

/// An in-memory model store keeping one inverted index per hash table.
pub struct InMemoryModelStore {
    batched: bool,
    state: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    next_track_id: u64,
    next_sub_fingerprint_id: u64,
    tracks: HashMap<TrackReference, TrackData>,
    track_sub_fingerprints: HashMap<TrackReference, Vec<SubFingerprintId>>,
    sub_fingerprints: HashMap<SubFingerprintId, Arc<SubFingerprint>>,
    /// `tables[t][bucket]` lists sub-fingerprints whose table `t` holds `bucket`.
    tables: Vec<HashMap<u64, Vec<SubFingerprintId>>>,
}

impl StoreState {
    fn votes(&self, hash_buckets: &[u64]) -> HashMap<SubFingerprintId, usize> {
        let mut votes = HashMap::new();
        for (table, bucket) in hash_buckets.iter().enumerate() {
            let Some(ids) = self.tables.get(table).and_then(|t| t.get(bucket)) else {
                continue;
            };
            for &id in ids {
                *votes.entry(id).or_insert(0) += 1;
            }
        }
        votes
    }
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self {
            batched: false,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Advertise (or hide) native support for batched sub-fingerprint reads.
    pub fn with_batched_queries(mut self, batched: bool) -> Self {
        self.batched = batched;
        self
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))
    }

    /// Register a track and return its reference.
    pub fn insert_track(&self, info: TrackInfo) -> TrackReference {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let reference = TrackReference::new(state.next_track_id);
        state.next_track_id += 1;
        debug!(track = %reference, title = %info.title, "track_inserted");
        state.tracks.insert(reference, TrackData { reference, info });
        state.track_sub_fingerprints.insert(reference, Vec::new());
        reference
    }

    /// Store hashed fingerprints for an existing track.
    ///
    /// All fingerprints in the store must share the same number of hash
    /// tables; the first insert fixes it.
    pub fn insert_hashed_fingerprints(
        &self,
        track: &TrackReference,
        fingerprints: impl IntoIterator<Item = HashedFingerprint>,
    ) -> Result<Vec<SubFingerprintId>, StoreError> {
        let mut state = self.write_state()?;
        if !state.tracks.contains_key(track) {
            return Err(StoreError::UnknownTrack(track.to_string()));
        }

        let fingerprints: Vec<HashedFingerprint> = fingerprints.into_iter().collect();
        let expected_tables = match (state.tables.len(), fingerprints.first()) {
            (0, Some(first)) => first.hash_buckets.len(),
            (tables, _) => tables,
        };
        for fp in &fingerprints {
            if fp.hash_buckets.is_empty() {
                return Err(StoreError::InvalidFingerprint(format!(
                    "fingerprint {} has no hash buckets",
                    fp.sequence_number
                )));
            }
            if fp.hash_buckets.len() != expected_tables {
                return Err(StoreError::InvalidFingerprint(format!(
                    "fingerprint {} has {} hash buckets, store expects {}",
                    fp.sequence_number,
                    fp.hash_buckets.len(),
                    expected_tables
                )));
            }
        }

        // Nothing is written until the whole batch has been checked.
        if state.tables.is_empty() {
            state.tables.resize_with(expected_tables, HashMap::new);
        }

        let mut ids = Vec::with_capacity(fingerprints.len());
        for fp in fingerprints {
            let id = SubFingerprintId::new(state.next_sub_fingerprint_id);
            state.next_sub_fingerprint_id += 1;
            for (table, &bucket) in fp.hash_buckets.iter().enumerate() {
                state.tables[table].entry(bucket).or_default().push(id);
            }
            let sub = Arc::new(SubFingerprint::from_hashed(id, *track, fp));
            state.sub_fingerprints.insert(id, sub);
            ids.push(id);
        }

        state
            .track_sub_fingerprints
            .entry(*track)
            .or_default()
            .extend(ids.iter().copied());
        debug!(track = %track, inserted = ids.len(), "sub_fingerprints_inserted");
        Ok(ids)
    }

    /// Remove a track and all its sub-fingerprints. Returns how many
    /// sub-fingerprints were dropped.
    pub fn delete_track(&self, track: &TrackReference) -> Result<usize, StoreError> {
        let mut state = self.write_state()?;
        if state.tracks.remove(track).is_none() {
            return Err(StoreError::UnknownTrack(track.to_string()));
        }
        let ids = state.track_sub_fingerprints.remove(track).unwrap_or_default();
        for id in &ids {
            let Some(sub) = state.sub_fingerprints.remove(id) else {
                continue;
            };
            for (table, bucket) in sub.hash_buckets.iter().enumerate() {
                if let Some(bucket_ids) = state.tables[table].get_mut(bucket) {
                    bucket_ids.retain(|candidate| candidate != id);
                    if bucket_ids.is_empty() {
                        state.tables[table].remove(bucket);
                    }
                }
            }
        }
        debug!(track = %track, removed = ids.len(), "track_deleted");
        Ok(ids.len())
    }

    pub fn track_count(&self) -> usize {
        self.read_state().map(|s| s.tracks.len()).unwrap_or(0)
    }

    pub fn sub_fingerprint_count(&self) -> usize {
        self.read_state()
            .map(|s| s.sub_fingerprints.len())
            .unwrap_or(0)
    }
}

impl Default for InMemoryModelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelStore for InMemoryModelStore {
    fn supports_batched_query(&self) -> bool {
        self.batched
    }

    fn read_sub_fingerprints(
        &self,
        hash_buckets: &[u64],
        query: &StoreQuery,
    ) -> Result<Vec<Arc<SubFingerprint>>, StoreError> {
        let state = self.read_state()?;
        let threshold = query.threshold_votes.max(1);

        let mut passing: Vec<(SubFingerprintId, usize)> = state
            .votes(hash_buckets)
            .into_iter()
            .filter(|&(_, votes)| votes >= threshold)
            .collect();
        // Most votes first, ids break ties so repeated reads agree.
        passing.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if let Some(max) = query.max_candidates {
            passing.truncate(max);
        }

        Ok(passing
            .into_iter()
            .filter_map(|(id, _)| state.sub_fingerprints.get(&id).cloned())
            .collect())
    }

    fn read_sub_fingerprints_batch(
        &self,
        hash_buckets: &[&[u64]],
        _query: &StoreQuery,
    ) -> Result<Vec<Arc<SubFingerprint>>, StoreError> {
        let state = self.read_state()?;
        let mut union = BTreeSet::new();
        for buckets in hash_buckets {
            union.extend(state.votes(buckets).into_keys());
        }
        Ok(union
            .into_iter()
            .filter_map(|id| state.sub_fingerprints.get(&id).cloned())
            .collect())
    }

    fn read_track(&self, reference: &TrackReference) -> Result<Option<TrackData>, StoreError> {
        Ok(self.read_state()?.tracks.get(reference).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(sequence: u32, buckets: &[u64]) -> HashedFingerprint {
        HashedFingerprint::from_parts(
            sequence,
            f64::from(sequence),
            f64::from(sequence) + 1.0,
            vec![sequence as u8; buckets.len()],
            buckets.to_vec(),
        )
    }

    fn seeded_store() -> (InMemoryModelStore, TrackReference, TrackReference) {
        let store = InMemoryModelStore::new();
        let a = store.insert_track(TrackInfo::new("A", "Alpha", 10.0));
        let b = store.insert_track(TrackInfo::new("B", "Bravo", 10.0));
        store
            .insert_hashed_fingerprints(&a, vec![fp(0, &[1, 2, 3, 4]), fp(1, &[5, 6, 7, 8])])
            .unwrap();
        store
            .insert_hashed_fingerprints(&b, vec![fp(0, &[1, 2, 30, 40])])
            .unwrap();
        (store, a, b)
    }

    #[test]
    fn single_lookup_applies_vote_threshold() {
        let (store, a, b) = seeded_store();

        let two_votes = store
            .read_sub_fingerprints(&[1, 2, 3, 99], &StoreQuery::new(2))
            .unwrap();
        assert_eq!(two_votes.len(), 2);
        // Track A shares three buckets, B only two.
        assert_eq!(two_votes[0].track, a);
        assert_eq!(two_votes[1].track, b);

        let three_votes = store
            .read_sub_fingerprints(&[1, 2, 3, 99], &StoreQuery::new(3))
            .unwrap();
        assert_eq!(three_votes.len(), 1);
        assert_eq!(three_votes[0].track, a);
    }

    #[test]
    fn buckets_only_match_in_their_own_table() {
        let (store, _, _) = seeded_store();
        let hits = store
            .read_sub_fingerprints(&[4, 3, 2, 1], &StoreQuery::new(1))
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn single_lookup_respects_max_candidates() {
        let (store, a, _) = seeded_store();
        let hits = store
            .read_sub_fingerprints(
                &[1, 2, 3, 4],
                &StoreQuery::new(1).with_max_candidates(Some(1)),
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].track, a);
    }

    #[test]
    fn batch_lookup_returns_deduplicated_union() {
        let (store, _, _) = seeded_store();
        let q1: &[u64] = &[1, 0, 0, 0];
        let q2: &[u64] = &[0, 2, 0, 0];
        let q3: &[u64] = &[0, 0, 0, 8];
        let hits = store
            .read_sub_fingerprints_batch(&[q1, q2, q3], &StoreQuery::new(5))
            .unwrap();
        let ids: Vec<u64> = hits.iter().map(|s| s.id.id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn default_batch_matches_native_batch() {
        struct Plain(InMemoryModelStore);
        impl ModelStore for Plain {
            fn read_sub_fingerprints(
                &self,
                hash_buckets: &[u64],
                query: &StoreQuery,
            ) -> Result<Vec<Arc<SubFingerprint>>, StoreError> {
                self.0.read_sub_fingerprints(hash_buckets, query)
            }
            fn read_track(
                &self,
                reference: &TrackReference,
            ) -> Result<Option<TrackData>, StoreError> {
                self.0.read_track(reference)
            }
        }

        let (store, _, _) = seeded_store();
        let q1: &[u64] = &[1, 2, 0, 0];
        let q2: &[u64] = &[5, 0, 0, 0];
        let native = store
            .read_sub_fingerprints_batch(&[q1, q2], &StoreQuery::new(1))
            .unwrap();
        let plain = Plain(store);
        assert!(!plain.supports_batched_query());
        let fallback = plain
            .read_sub_fingerprints_batch(&[q1, q2], &StoreQuery::new(1))
            .unwrap();
        assert_eq!(native, fallback);
    }

    #[test]
    fn insert_rejects_unknown_track_and_mismatched_tables() {
        let (store, a, _) = seeded_store();
        let err = store
            .insert_hashed_fingerprints(&TrackReference::new(99), vec![fp(0, &[1, 2, 3, 4])])
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownTrack(_)));

        let err = store
            .insert_hashed_fingerprints(&a, vec![fp(2, &[1, 2])])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidFingerprint(_)));
    }

    #[test]
    fn mixed_width_first_batch_is_rejected_without_side_effects() {
        let store = InMemoryModelStore::new();
        let track = store.insert_track(TrackInfo::new("Artist", "Song", 10.0));

        let err = store
            .insert_hashed_fingerprints(&track, vec![fp(0, &[1, 2]), fp(1, &[1, 2, 3, 4])])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidFingerprint(_)));
        assert_eq!(store.sub_fingerprint_count(), 0);

        // The store stays usable and the table count is still open.
        assert!(store.read_track(&track).unwrap().is_some());
        store
            .insert_hashed_fingerprints(&track, vec![fp(0, &[1, 2, 3, 4])])
            .unwrap();
        let hits = store
            .read_sub_fingerprints(&[1, 2, 3, 4], &StoreQuery::new(4))
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn delete_track_drops_postings() {
        let (store, a, b) = seeded_store();
        assert_eq!(store.sub_fingerprint_count(), 3);

        assert_eq!(store.delete_track(&a).unwrap(), 2);
        assert_eq!(store.track_count(), 1);
        assert_eq!(store.sub_fingerprint_count(), 1);
        assert!(store.read_track(&a).unwrap().is_none());

        let hits = store
            .read_sub_fingerprints(&[1, 2, 3, 4], &StoreQuery::new(1))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].track, b);
    }

    #[test]
    fn read_track_returns_inserted_info() {
        let (store, a, _) = seeded_store();
        let track = store.read_track(&a).unwrap().expect("track exists");
        assert_eq!(track.reference, a);
        assert_eq!(track.info.title, "Alpha");
        assert!(!store.supports_batched_query());
        assert!(InMemoryModelStore::new()
            .with_batched_queries(true)
            .supports_batched_query());
    }
}
