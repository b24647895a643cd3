//! LSH banding and bitwise distance over packed min-hash signatures.

use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::config::{FingerprintError, HashingConfig};

/// Fold a min-hash signature into one bucket id per hash table.
///
/// Table `t` covers signature bytes `[t * keys, (t + 1) * keys)` and is hashed
/// with `t` as the seed, so equal bands in different tables land in
/// different buckets. Bytes past `hashing.signature_len()` are ignored.
pub fn hash_buckets(
    signature: &[u8],
    hashing: &HashingConfig,
) -> Result<Vec<u64>, FingerprintError> {
    hashing.validate()?;
    let expected = hashing.signature_len();
    if signature.len() < expected {
        return Err(FingerprintError::SignatureTooShort {
            expected,
            actual: signature.len(),
        });
    }

    Ok(signature[..expected]
        .chunks_exact(hashing.min_hashes_per_table)
        .enumerate()
        .map(|(table, band)| xxh3_64_with_seed(band, table as u64))
        .collect())
}

/// Number of differing bits between two packed signatures.
///
/// When lengths differ, every bit of the unmatched tail counts as different.
#[inline]
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    let common = a.len().min(b.len());
    let differing: u32 = a[..common]
        .iter()
        .zip(&b[..common])
        .map(|(&x, &y)| (x ^ y).count_ones())
        .sum();
    let tail = (a.len().max(b.len()) - common) as u32;
    differing + tail * u8::BITS
}
