//! Shared workload generation and verification helpers for CLI commands.

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Zipf;

/// Key distribution for generated workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyDistribution {
    /// Uniform random keys over the full u64 range
    Uniform,
    /// Duplicate-heavy keys drawn from a small Zipf-weighted alphabet
    Dupes,
    /// Already sorted ascending (idempotence check)
    Sorted,
    /// Sorted descending
    Reversed,
    /// One long duplicate run with a single extreme outlier
    Outlier,
}

impl KeyDistribution {
    /// All distributions, for round-robin stress coverage.
    pub const ALL: [KeyDistribution; 5] = [
        KeyDistribution::Uniform,
        KeyDistribution::Dupes,
        KeyDistribution::Sorted,
        KeyDistribution::Reversed,
        KeyDistribution::Outlier,
    ];
}

/// Generate `count` keys following the requested distribution.
pub fn generate_keys(dist: KeyDistribution, count: usize, rng: &mut StdRng) -> Vec<u64> {
    match dist {
        KeyDistribution::Uniform => (0..count).map(|_| rng.random()).collect(),
        KeyDistribution::Dupes => {
            let zipf = Zipf::new(64.0, 1.2).expect("valid Zipf parameters");
            (0..count).map(|_| rng.sample(zipf) as u64).collect()
        }
        KeyDistribution::Sorted => (0..count as u64).collect(),
        KeyDistribution::Reversed => (0..count as u64).rev().collect(),
        KeyDistribution::Outlier => {
            let mut keys = vec![7u64; count];
            if count > 0 {
                let at = rng.random_range(0..count);
                keys[at] = u64::MAX;
            }
            keys
        }
    }
}

/// True when `keys` is globally non-decreasing.
#[must_use]
pub fn is_sorted(keys: &[u64]) -> bool {
    keys.windows(2).all(|w| w[0] <= w[1])
}

/// Verify that `sorted`/`values` is a lockstep permutation of
/// `original`: every value is the element's original index and must point
/// back at its own key.
#[must_use]
pub fn values_in_lockstep(original: &[u64], sorted: &[u64], values: &[u64]) -> bool {
    if sorted.len() != original.len() || values.len() != original.len() {
        return false;
    }
    sorted
        .iter()
        .zip(values.iter())
        .all(|(&key, &value)| original.get(value as usize) == Some(&key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_generated_lengths() {
        let mut rng = StdRng::seed_from_u64(1);
        for dist in KeyDistribution::ALL {
            assert_eq!(generate_keys(dist, 100, &mut rng).len(), 100);
            assert!(generate_keys(dist, 0, &mut rng).is_empty());
        }
    }

    #[test]
    fn test_sorted_distribution_is_sorted() {
        let mut rng = StdRng::seed_from_u64(2);
        assert!(is_sorted(&generate_keys(KeyDistribution::Sorted, 50, &mut rng)));
        assert!(!is_sorted(&generate_keys(KeyDistribution::Reversed, 50, &mut rng)));
    }

    #[test]
    fn test_outlier_has_one_extreme() {
        let mut rng = StdRng::seed_from_u64(3);
        let keys = generate_keys(KeyDistribution::Outlier, 100, &mut rng);
        assert_eq!(keys.iter().filter(|&&k| k == u64::MAX).count(), 1);
        assert_eq!(keys.iter().filter(|&&k| k == 7).count(), 99);
    }

    #[test]
    fn test_values_in_lockstep() {
        let original = [30u64, 10, 20];
        assert!(values_in_lockstep(&original, &[10, 20, 30], &[1, 2, 0]));
        assert!(!values_in_lockstep(&original, &[10, 20, 30], &[0, 2, 1]));
    }
}
