//! Fingerprint and track types shared by the store and the matcher.
//!
//! Fingerprints are immutable once built. Stored sub-fingerprints are handed
//! out behind `Arc` by model stores so the matcher can hold on to them for
//! the duration of a query without copying signatures.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{FingerprintError, HashingConfig};
use crate::hashing::hash_buckets;

/// Opaque identifier of an indexed track.
///
/// Two references are equal iff they point to the same stored track; the
/// numeric value carries no meaning beyond identity and a stable ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackReference(u64);

impl TrackReference {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrackReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

/// Identifier of a stored sub-fingerprint, unique within one model store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubFingerprintId(u64);

impl SubFingerprintId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(&self) -> u64 {
        self.0
    }
}

/// Descriptive metadata supplied when a track is indexed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TrackInfo {
    pub isrc: Option<String>,
    pub artist: String,
    pub title: String,
    pub duration_secs: f64,
}

impl TrackInfo {
    pub fn new(artist: impl Into<String>, title: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            isrc: None,
            artist: artist.into(),
            title: title.into(),
            duration_secs,
        }
    }

    pub fn with_isrc(mut self, isrc: impl Into<String>) -> Self {
        self.isrc = Some(isrc.into());
        self
    }
}

/// A track record as held by a model store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackData {
    pub reference: TrackReference,
    pub info: TrackInfo,
}

/// One hashed time slice of the query audio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HashedFingerprint {
    /// Position of this slice within the query, starting at zero.
    pub sequence_number: u32,
    /// Start offset within the query, in seconds.
    pub start_at: f64,
    /// End offset within the query, in seconds.
    pub end_at: f64,
    /// Packed min-hash signature the buckets were derived from.
    pub signature: Vec<u8>,
    /// One LSH bucket id per hash table.
    pub hash_buckets: Vec<u64>,
}

impl HashedFingerprint {
    /// Build a fingerprint from its min-hash signature, deriving the buckets.
    pub fn new(
        sequence_number: u32,
        start_at: f64,
        end_at: f64,
        signature: Vec<u8>,
        hashing: &HashingConfig,
    ) -> Result<Self, FingerprintError> {
        let hash_buckets = hash_buckets(&signature, hashing)?;
        Ok(Self::from_parts(
            sequence_number,
            start_at,
            end_at,
            signature,
            hash_buckets,
        ))
    }

    /// Build a fingerprint from precomputed buckets.
    pub fn from_parts(
        sequence_number: u32,
        start_at: f64,
        end_at: f64,
        signature: Vec<u8>,
        hash_buckets: Vec<u64>,
    ) -> Self {
        Self {
            sequence_number,
            start_at,
            end_at,
            signature,
            hash_buckets,
        }
    }

    pub fn hash_tables(&self) -> usize {
        self.hash_buckets.len()
    }
}

/// A fingerprint stored for an indexed track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubFingerprint {
    pub id: SubFingerprintId,
    /// Track this sub-fingerprint belongs to.
    pub track: TrackReference,
    /// Position within the owning track.
    pub sequence_number: u32,
    pub start_at: f64,
    pub end_at: f64,
    pub signature: Vec<u8>,
    pub hash_buckets: Vec<u64>,
}

impl SubFingerprint {
    /// Attach a hashed fingerprint to a track under the given id.
    pub fn from_hashed(
        id: SubFingerprintId,
        track: TrackReference,
        hashed: HashedFingerprint,
    ) -> Self {
        let HashedFingerprint {
            sequence_number,
            start_at,
            end_at,
            signature,
            hash_buckets,
        } = hashed;
        Self {
            id,
            track,
            sequence_number,
            start_at,
            end_at,
            signature,
            hash_buckets,
        }
    }
}
