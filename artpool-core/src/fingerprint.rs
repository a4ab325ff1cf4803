//! Byte-sampled perceptual fingerprints.
//!
//! This approximates average-hashing without decoding pixels: 64 evenly
//! spaced bytes are sampled from the file body, and bit `i` is set when
//! sample `i` is at or above the sample mean. Identical files always match;
//! re-encoded copies of the same picture often do not, and unrelated files
//! with similar container layout can collide.

use std::fmt;
use std::path::Path;

use crate::error::Result;
use crate::state::FingerprintIndex;

/// Bytes skipped at the start of a file so format headers and metadata
/// blocks do not dominate the samples.
pub const HEADER_SKIP: usize = 256;

pub const SAMPLE_COUNT: usize = 64;

/// Default maximum Hamming distance treated as a duplicate (~84% similar).
pub const DEFAULT_DUPLICATE_THRESHOLD: u32 = 10;

/// 64-bit fingerprint. Zero means "could not be computed" and never matches.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const EMPTY: Fingerprint = Fingerprint(0);

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let body = match bytes.get(HEADER_SKIP..) {
            Some(body) if body.len() >= SAMPLE_COUNT => body,
            _ => return Self::EMPTY,
        };

        let len = body.len();
        let half_stride = len / (SAMPLE_COUNT * 2);
        let mut samples = [0u8; SAMPLE_COUNT];
        for (i, sample) in samples.iter_mut().enumerate() {
            let idx = (i * len / SAMPLE_COUNT + half_stride).min(len - 1);
            *sample = body[idx];
        }

        // Compare against the mean without floats: s >= sum/64 <=> 64*s >= sum.
        let sum: u32 = samples.iter().map(|s| u32::from(*s)).sum();
        let bits = samples
            .iter()
            .enumerate()
            .filter(|(_, s)| u32::from(**s) * SAMPLE_COUNT as u32 >= sum)
            .fold(0u64, |acc, (i, _)| acc | (1u64 << i));

        Self(bits)
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(&bytes))
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of differing bits.
    pub const fn distance(self, other: Fingerprint) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Near-duplicate test. An empty fingerprint matches nothing, itself
    /// included.
    pub const fn is_near(self, other: Fingerprint, threshold: u32) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.distance(other) <= threshold
    }
}

impl From<u64> for Fingerprint {
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:016x})", self.0)
    }
}

/// Name of the first indexed member within `threshold` bits of `candidate`.
pub fn find_near_duplicate<'a>(
    candidate: Fingerprint,
    index: &'a FingerprintIndex,
    threshold: u32,
) -> Option<&'a str> {
    index
        .fingerprints()
        .find(|(_, existing)| candidate.is_near(*existing, threshold))
        .map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy(seed: u64, len: usize) -> Vec<u8> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (state >> 56) as u8
            })
            .collect()
    }

    #[test]
    fn identical_bytes_produce_identical_fingerprints() {
        let bytes = noisy(7, 8_192);
        let a = Fingerprint::from_bytes(&bytes);
        let b = Fingerprint::from_bytes(&bytes);
        assert!(!a.is_empty());
        assert_eq!(a, b);
        assert!(a.is_near(b, DEFAULT_DUPLICATE_THRESHOLD));
    }

    #[test]
    fn header_bytes_do_not_influence_the_fingerprint() {
        let mut a = noisy(3, 8_192);
        let b = a.clone();
        for byte in a.iter_mut().take(HEADER_SKIP) {
            *byte = 0xAA;
        }
        assert_eq!(Fingerprint::from_bytes(&a), Fingerprint::from_bytes(&b));
    }

    #[test]
    fn tiny_files_yield_the_empty_fingerprint() {
        let fp = Fingerprint::from_bytes(&[1u8; HEADER_SKIP + 10]);
        assert!(fp.is_empty());
        assert!(!fp.is_near(fp, 64));
        assert!(!fp.is_near(Fingerprint::from(0xFFFF), 64));
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let base = Fingerprint::from(0xF0F0_F0F0_F0F0_F0F0);
        let ten_off = Fingerprint::from(base.bits() ^ 0x3FF);
        let eleven_off = Fingerprint::from(base.bits() ^ 0x7FF);

        assert_eq!(base.distance(ten_off), 10);
        assert!(base.is_near(ten_off, 10));
        assert_eq!(base.distance(eleven_off), 11);
        assert!(!base.is_near(eleven_off, 10));
    }

    #[test]
    fn finds_duplicates_in_an_index() {
        let mut index = FingerprintIndex::default();
        index.insert("pool_1.jpg", Fingerprint::from(0xFF00));
        index.insert("pool_2.jpg", Fingerprint::EMPTY);

        let near = Fingerprint::from(0xFF01);
        let far = Fingerprint::from(0x00FF_0000_0000_00FF);
        assert_eq!(find_near_duplicate(near, &index, 10), Some("pool_1.jpg"));
        assert_eq!(find_near_duplicate(far, &index, 10), None);
        assert_eq!(find_near_duplicate(Fingerprint::EMPTY, &index, 64), None);
    }
}
