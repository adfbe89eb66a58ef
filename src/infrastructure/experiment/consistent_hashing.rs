//! Consistent hashing for experiment variant assignment
//!
//! Ensures the same subject always lands on the same point for a given
//! experiment, across processes and toolchain versions.

use sha2::{Digest, Sha256};

/// Separator between experiment and subject ids in the hash input
const FIELD_SEPARATOR: u8 = 0x1f;

/// Consistent hasher for experiment assignments
#[derive(Debug, Clone, Copy)]
pub struct ConsistentHasher;

impl ConsistentHasher {
    /// Deterministic point in `[0, 1)` for a subject within an experiment
    ///
    /// The top 53 bits of `SHA-256(experiment_id 0x1F subject_id)` are scaled
    /// into the unit interval, which uses the full precision of an `f64`.
    pub fn bucket(experiment_id: &str, subject_id: &str) -> f64 {
        let mut hasher = Sha256::new();
        hasher.update(experiment_id.as_bytes());
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(subject_id.as_bytes());
        let digest = hasher.finalize();

        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let top_bits = u64::from_be_bytes(prefix) >> 11;

        top_bits as f64 / (1u64 << 53) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistent_hash_same_input() {
        let first = ConsistentHasher::bucket("exp-1", "user-1");
        let second = ConsistentHasher::bucket("exp-1", "user-1");
        assert_eq!(first, second, "Same inputs should produce same bucket");
    }

    #[test]
    fn test_bucket_in_unit_interval() {
        for i in 0..1000 {
            let point = ConsistentHasher::bucket("exp-1", &format!("user-{}", i));
            assert!((0.0..1.0).contains(&point));
        }
    }

    #[test]
    fn test_separator_prevents_concatenation_collisions() {
        let a = ConsistentHasher::bucket("exp-1", "23");
        let b = ConsistentHasher::bucket("exp-12", "3");
        assert_ne!(a, b);
    }

    #[test]
    fn test_different_experiments_bucket_independently() {
        let same = (0..200)
            .filter(|i| {
                let subject = format!("user-{}", i);
                let a = ConsistentHasher::bucket("exp-a", &subject) < 0.5;
                let b = ConsistentHasher::bucket("exp-b", &subject) < 0.5;
                a == b
            })
            .count();

        // Independent halves agree about half the time
        assert!(same > 60 && same < 140, "agreement was {}", same);
    }

    #[test]
    fn test_hash_distribution() {
        let mut buckets = [0u32; 10];

        for i in 0..10_000 {
            let point = ConsistentHasher::bucket("exp-1", &format!("key-{}", i));
            buckets[(point * 10.0) as usize] += 1;
        }

        for count in buckets {
            assert!(count > 850, "Bucket has too few items: {}", count);
            assert!(count < 1150, "Bucket has too many items: {}", count);
        }
    }
}
