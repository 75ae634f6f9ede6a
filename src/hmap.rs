//! Bounded content-addressed digest set
//!
//! Deduplicates extracted null vectors by their 16-byte BLAKE2s fingerprint.
//! Fixed bucket count, four slots per bucket, no rehashing: a full bucket
//! just drops the insert, because the outer loop will produce fresh
//! candidates next batch and capacity is provisioned at ten times the target
//! to keep the drop rate negligible.

#![forbid(unsafe_code)]

/// Digest width in bytes.
pub const DIGEST_SIZE: usize = 16;

/// Slots per bucket.
const BUCKET_SLOTS: usize = 4;

/// Outcome of an insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insert {
    /// New digest, stored.
    Success,
    /// Already present, dropped.
    Duplicate,
    /// Bucket exhausted, dropped.
    BucketFull,
}

/// Bounded set of digests, indexed by bucket.
pub struct NullHashMap {
    buckets: Vec<[[u8; DIGEST_SIZE]; BUCKET_SLOTS]>,
    counts: Vec<u8>,
    size: usize,
}

impl NullHashMap {
    /// Set sized for `capacity` digests; the bucket count is the next power
    /// of two covering it.
    pub fn new(capacity: usize) -> Self {
        let nbuckets = capacity.div_ceil(BUCKET_SLOTS).next_power_of_two().max(1);
        Self {
            buckets: vec![[[0u8; DIGEST_SIZE]; BUCKET_SLOTS]; nbuckets],
            counts: vec![0u8; nbuckets],
            size: 0,
        }
    }

    /// Number of stored digests.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    fn bucket_of(&self, digest: &[u8; DIGEST_SIZE]) -> usize {
        let mut b = [0u8; 8];
        b.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(b) as usize) & (self.buckets.len() - 1)
    }

    pub fn insert(&mut self, digest: &[u8; DIGEST_SIZE]) -> Insert {
        let bi = self.bucket_of(digest);
        let n = self.counts[bi] as usize;
        for slot in &self.buckets[bi][..n] {
            if slot == digest {
                return Insert::Duplicate;
            }
        }
        if n == BUCKET_SLOTS {
            return Insert::BucketFull;
        }
        self.buckets[bi][n] = *digest;
        self.counts[bi] = (n + 1) as u8;
        self.size += 1;
        Insert::Success
    }
}
