//! Descriptive statistics over branch lengths.

use accurate::sum::Sum2;
use accurate::traits::*;

/// Summary statistics of a set of values
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Median, the mean of the two middle values for an even count
    pub median: f64,
    /// Population variance
    pub variance: f64,
    /// Population standard deviation
    pub stdev: f64,
}

/// Computes the summary statistics of a set of values.
/// Every statistic of an empty set is 0.
/// ```
/// use ntree::stats::summarize;
///
/// let summary = summarize(&[4.0, 1.0, 3.0, 2.0]);
/// assert_eq!(summary.min, 1.0);
/// assert_eq!(summary.max, 4.0);
/// assert_eq!(summary.mean, 2.5);
/// assert_eq!(summary.median, 2.5);
/// assert_eq!(summary.variance, 1.25);
/// ```
pub fn summarize(values: &[f64]) -> Summary {
    if values.is_empty() {
        return Summary::default();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();

    let mean = sorted.iter().cloned().sum_with_accumulator::<Sum2<_>>() / n as f64;
    let variance = sorted
        .iter()
        .map(|v| (v - mean) * (v - mean))
        .sum_with_accumulator::<Sum2<_>>()
        / n as f64;

    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    Summary {
        min: sorted[0],
        max: sorted[n - 1],
        mean,
        median,
        variance,
        stdev: variance.sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(summarize(&[]), Summary::default());
    }

    #[test]
    fn odd_count() {
        let s = summarize(&[2.0, 9.0, 4.0]);
        assert_eq!(s.median, 4.0);
        assert_eq!(s.mean, 5.0);
        assert!((s.variance - 26.0 / 3.0).abs() < 1e-12);
        assert!((s.stdev - (26.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn compensated_mean() {
        let values = vec![1e16, 1.0, -1e16, 1.0];
        let s = summarize(&values);
        assert_eq!(s.mean, 0.5);
    }

    #[test]
    fn single_value() {
        let s = summarize(&[0.5]);
        assert_eq!(s.min, 0.5);
        assert_eq!(s.max, 0.5);
        assert_eq!(s.median, 0.5);
        assert_eq!(s.variance, 0.0);
    }
}
