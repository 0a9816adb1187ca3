//! Cross-sectional percentile reduction of trajectory batches.

use stratfit_core::{PercentileBands, PercentileTriple};
use thiserror::Error;

/// Percentiles used for visualization bands.
pub const DEFAULT_PERCENTILES: [f64; 3] = [0.05, 0.50, 0.95];

/// Errors produced by the aggregator.
#[derive(Debug, Error, PartialEq)]
pub enum AggregateError {
    #[error("cannot aggregate an empty batch")]
    EmptyBatch,
    #[error("trajectory {index} has length {found}, expected {expected}")]
    RaggedBatch {
        index: usize,
        expected: usize,
        found: usize,
    },
    /// Percentiles must lie in [0, 1] and be given in ascending order.
    #[error("invalid percentile set: {0:?}")]
    InvalidPercentiles([f64; 3]),
}

/// Sorted copy of `samples`. The input is left untouched.
pub fn sorted_copy(samples: &[f64]) -> Vec<f64> {
    let mut s = samples.to_vec();
    s.sort_by(f64::total_cmp);
    s
}

/// Linear-interpolated percentile of an ascending sample at rank `p * (n - 1)`.
///
/// `p` is a fraction in [0, 1]. Returns 0 for an empty sample.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let (a, b) = (sorted[lo], sorted[hi]);
            let frac = rank - lo as f64;
            // rounding must not push the blend outside its bracket
            (a + (b - a) * frac).max(a).min(b)
        }
    }
}

/// p10/p50/p90 of an unsorted sample.
pub fn triple(samples: &[f64]) -> PercentileTriple {
    let sorted = sorted_copy(samples);
    PercentileTriple {
        p10: percentile(&sorted, 0.10),
        p50: percentile(&sorted, 0.50),
        p90: percentile(&sorted, 0.90),
    }
}

/// Reduce a rectangular batch into low/median/high bands.
///
/// `percentiles` are (low, mid, high) fractions; they fill `p05`, `p50`
/// and `p95` of the result respectively.
pub fn aggregate(
    paths: &[Vec<f64>],
    percentiles: [f64; 3],
) -> Result<PercentileBands, AggregateError> {
    let [lo, mid, hi] = percentiles;
    let in_unit = percentiles.iter().all(|p| (0.0..=1.0).contains(p));
    if !in_unit || lo > mid || mid > hi {
        return Err(AggregateError::InvalidPercentiles(percentiles));
    }
    let first = paths.first().ok_or(AggregateError::EmptyBatch)?;
    let steps = first.len();
    if let Some((index, p)) = paths.iter().enumerate().find(|(_, p)| p.len() != steps) {
        return Err(AggregateError::RaggedBatch {
            index,
            expected: steps,
            found: p.len(),
        });
    }

    let mut bands = PercentileBands {
        p05: Vec::with_capacity(steps),
        p50: Vec::with_capacity(steps),
        p95: Vec::with_capacity(steps),
    };
    let mut column = Vec::with_capacity(paths.len());
    for t in 0..steps {
        column.clear();
        column.extend(paths.iter().map(|p| p[t]));
        column.sort_by(f64::total_cmp);
        bands.p05.push(percentile(&column, lo));
        bands.p50.push(percentile(&column, mid));
        bands.p95.push(percentile(&column, hi));
    }
    Ok(bands)
}

/// [`aggregate`] with the 5/50/95 percentiles.
pub fn aggregate_default(paths: &[Vec<f64>]) -> Result<PercentileBands, AggregateError> {
    aggregate(paths, DEFAULT_PERCENTILES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn interpolates_between_ranks() {
        let s = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(percentile(&s, 0.0), 10.0);
        assert_eq!(percentile(&s, 0.5), 30.0);
        assert_eq!(percentile(&s, 1.0), 50.0);
        // rank 0.05 * 4 = 0.2
        assert!((percentile(&s, 0.05) - 12.0).abs() < 1e-9);
        // rank 0.95 * 4 = 3.8
        assert!((percentile(&s, 0.95) - 48.0).abs() < 1e-9);
    }

    #[test]
    fn single_trajectory_collapses() {
        let path = vec![1.0, 1.5, 0.7, 2.2];
        let bands = aggregate_default(std::slice::from_ref(&path)).unwrap();
        assert_eq!(bands.p05, path);
        assert_eq!(bands.p50, path);
        assert_eq!(bands.p95, path);
    }

    #[test]
    fn input_is_not_mutated() {
        let paths = vec![vec![3.0, 1.0], vec![1.0, 3.0], vec![2.0, 2.0]];
        let before = paths.clone();
        aggregate_default(&paths).unwrap();
        assert_eq!(paths, before);
    }

    #[test]
    fn rejects_empty_ragged_and_bad_percentiles() {
        assert_eq!(aggregate_default(&[]), Err(AggregateError::EmptyBatch));
        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        assert_eq!(
            aggregate_default(&ragged),
            Err(AggregateError::RaggedBatch { index: 1, expected: 2, found: 1 })
        );
        let ok = vec![vec![1.0]];
        assert!(aggregate(&ok, [0.9, 0.5, 0.1]).is_err());
        assert!(aggregate(&ok, [0.0, 0.5, 1.5]).is_err());
    }

    #[test]
    fn parameterizable_percentiles() {
        let paths: Vec<Vec<f64>> = (0..=10).map(|i| vec![i as f64]).collect();
        let bands = aggregate(&paths, [0.1, 0.5, 0.9]).unwrap();
        assert_eq!(bands.at(0), Some((1.0, 5.0, 9.0)));
    }

    #[test]
    fn triple_of_unsorted_sample() {
        let t = triple(&[9.0, 1.0, 5.0, 3.0, 7.0]);
        assert!(t.is_ordered());
        assert_eq!(t.p50, 5.0);
    }

    proptest! {
        #[test]
        fn bands_are_ordered(paths in prop::collection::vec(
            prop::collection::vec(-1.0e6f64..1.0e6, 8), 1..40)) {
            let bands = aggregate_default(&paths).unwrap();
            prop_assert_eq!(bands.len(), 8);
            prop_assert!(bands.is_ordered());
        }
    }
}
