use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Allowed relative deviation from the raw mean.
pub const TOLERANCE: f64 = 0.2;

/// How samples are screened against the raw mean before averaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FilterPolicy {
    /// Drop samples slower than `1.2 * mean`.
    #[default]
    OneSided,
    /// Drop samples outside `[0.8 * mean, 1.2 * mean]`.
    TwoSided,
    /// Keep every sample.
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Mean of all input samples.
    pub mean: f64,
    pub kept: Vec<u64>,
    pub dropped: Vec<u64>,
}

impl FilterPolicy {
    pub fn keeps(self, value: u64, mean: f64) -> bool {
        let value = value as f64;
        match self {
            FilterPolicy::OneSided => value <= mean * (1.0 + TOLERANCE),
            FilterPolicy::TwoSided => {
                value >= mean * (1.0 - TOLERANCE) && value <= mean * (1.0 + TOLERANCE)
            }
            FilterPolicy::None => true,
        }
    }

    /// Partition `samples` against their own mean, preserving input order.
    pub fn apply(self, samples: &[u64]) -> FilterOutcome {
        let Some(mean) = mean(samples) else {
            return FilterOutcome {
                mean: 0.0,
                kept: Vec::new(),
                dropped: Vec::new(),
            };
        };

        let (kept, dropped): (Vec<u64>, Vec<u64>) = samples.iter().partition(|&&v| self.keeps(v, mean));
        FilterOutcome {
            mean,
            kept,
            dropped,
        }
    }
}

pub fn mean(samples: &[u64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(wide_sum(samples) as f64 / samples.len() as f64)
}

/// Sum divided by count with integer division.
pub fn integer_mean(samples: &[u64]) -> Option<u64> {
    if samples.is_empty() {
        return None;
    }
    // The quotient never exceeds the largest sample, so it fits back in u64.
    Some((wide_sum(samples) / samples.len() as u128) as u64)
}

fn wide_sum(samples: &[u64]) -> u128 {
    samples.iter().map(|&v| u128::from(v)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nine_fast_one_slow() -> Vec<u64> {
        let mut samples = vec![100; 9];
        samples.push(500);
        samples
    }

    #[test]
    fn one_sided_drops_slow_outlier() {
        let outcome = FilterPolicy::OneSided.apply(&nine_fast_one_slow());
        assert_eq!(outcome.mean, 140.0);
        assert_eq!(outcome.kept, vec![100; 9]);
        assert_eq!(outcome.dropped, vec![500]);
        assert_eq!(integer_mean(&outcome.kept), Some(100));
    }

    #[test]
    fn one_sided_keeps_fast_samples() {
        // mean 97.5, cutoff 117
        let outcome = FilterPolicy::OneSided.apply(&[90, 100, 100, 100]);
        assert_eq!(outcome.kept, vec![90, 100, 100, 100]);
        assert!(outcome.dropped.is_empty());
    }

    #[test]
    fn one_sided_fast_spike_drags_cutoff_below_typical_runs() {
        // mean 77.5, cutoff 93
        let outcome = FilterPolicy::OneSided.apply(&[10, 100, 100, 100]);
        assert_eq!(outcome.kept, vec![10]);
        assert_eq!(outcome.dropped, vec![100, 100, 100]);
    }

    #[test]
    fn two_sided_drops_fast_and_slow() {
        // mean = 100; bounds [80, 120]
        let outcome = FilterPolicy::TwoSided.apply(&[50, 100, 100, 100, 150]);
        assert_eq!(outcome.mean, 100.0);
        assert_eq!(outcome.kept, vec![100, 100, 100]);
        assert_eq!(outcome.dropped, vec![50, 150]);
    }

    #[test]
    fn two_sided_bounds_are_inclusive() {
        // mean = 100
        let outcome = FilterPolicy::TwoSided.apply(&[80, 120, 100]);
        assert_eq!(outcome.kept, vec![80, 120, 100]);
    }

    #[test]
    fn two_sided_can_exclude_everything() {
        // mean = 50; bounds [40, 60]
        let outcome = FilterPolicy::TwoSided.apply(&[0, 100]);
        assert!(outcome.kept.is_empty());
        assert_eq!(outcome.dropped, vec![0, 100]);
    }

    #[test]
    fn none_keeps_everything() {
        let outcome = FilterPolicy::None.apply(&nine_fast_one_slow());
        assert_eq!(outcome.kept.len(), 10);
        assert_eq!(integer_mean(&outcome.kept), Some(140));
    }

    #[test]
    fn empty_input() {
        let outcome = FilterPolicy::OneSided.apply(&[]);
        assert!(outcome.kept.is_empty());
        assert!(outcome.dropped.is_empty());
        assert_eq!(mean(&[]), None);
        assert_eq!(integer_mean(&[]), None);
    }

    #[test]
    fn means_do_not_overflow() {
        let samples = [u64::MAX, u64::MAX, u64::MAX - 2];
        assert_eq!(integer_mean(&samples), Some(u64::MAX - 1));
        assert!(mean(&samples).unwrap() > 1.8e19);
    }

    #[test]
    fn integer_mean_truncates() {
        assert_eq!(integer_mean(&[1, 2]), Some(1));
        assert_eq!(integer_mean(&[10, 10, 11]), Some(10));
    }

    #[test]
    fn kept_is_subset_and_mean_never_exceeds_max() {
        let inputs: Vec<Vec<u64>> = vec![
            vec![1],
            vec![5, 5, 5],
            vec![1, 1000],
            vec![90, 95, 100, 105, 400],
            vec![3, 7, 11, 13, 17, 19, 23, 1000],
            vec![0, 0, 0, 1],
        ];

        for policy in [FilterPolicy::OneSided, FilterPolicy::TwoSided, FilterPolicy::None] {
            for samples in &inputs {
                let outcome = policy.apply(samples);
                assert_eq!(outcome.kept.len() + outcome.dropped.len(), samples.len());
                for v in &outcome.kept {
                    assert!(samples.contains(v), "{policy:?} kept {v} not in {samples:?}");
                    assert!(policy.keeps(*v, outcome.mean));
                }
                for v in &outcome.dropped {
                    assert!(!policy.keeps(*v, outcome.mean));
                }
                if let Some(avg) = integer_mean(&outcome.kept) {
                    let max = *samples.iter().max().unwrap();
                    assert!(avg <= max, "{policy:?}: mean {avg} exceeds max {max}");
                }
            }
        }
    }

    #[test]
    fn one_sided_never_empties_non_empty_input() {
        // The minimum sample is always <= the mean.
        for samples in [vec![1, 1_000_000], vec![7], vec![0, 0, 50]] {
            assert!(!FilterPolicy::OneSided.apply(&samples).kept.is_empty());
        }
    }
}
