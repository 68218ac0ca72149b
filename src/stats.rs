//! Descriptive statistics for distance distributions.
//!
//! Small numeric helpers consumed by downstream reporting when summarizing
//! per-pair distance samples across many trees. Empty inputs yield `None`
//! rather than NaN.

use std::collections::HashMap;

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median; the average of the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid] + sorted[mid - 1]) / 2.0
    })
}

/// Most frequent value, by exact (bit-pattern) equality.
///
/// Ties resolve to the smallest value so the result does not depend on
/// hash-map iteration order.
pub fn mode(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for v in values {
        *counts.entry(v.to_bits()).or_insert(0) += 1;
    }

    let mut best: Option<(usize, f64)> = None;
    for (&bits, &count) in &counts {
        let value = f64::from_bits(bits);
        let better = match best {
            None => true,
            Some((best_count, best_value)) => {
                count > best_count || (count == best_count && value < best_value)
            }
        };
        if better {
            best = Some((count, value));
        }
    }
    best.map(|(_, value)| value)
}

/// Mean of the values lying within `sigma` population standard deviations
/// of the overall mean; a cheap way to drop outlier pairs before averaging.
pub fn sigma_trimmed_mean(values: &[f64], sigma: f64) -> Option<f64> {
    let center = mean(values)?;
    let variance =
        values.iter().map(|v| (v - center) * (v - center)).sum::<f64>() / values.len() as f64;
    let sd = variance.sqrt();

    let low = center - sigma * sd;
    let high = center + sigma * sd;
    let kept: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| *v >= low && *v <= high)
        .collect();
    mean(&kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_basics() {
        assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn mode_prefers_frequency_then_smallness() {
        assert_eq!(mode(&[1.0, 2.0, 2.0, 3.0]), Some(2.0));
        // Tied counts: the smaller value wins deterministically.
        assert_eq!(mode(&[5.0, 1.0]), Some(1.0));
        assert_eq!(mode(&[]), None);
    }

    #[test]
    fn sigma_trim_drops_outliers() {
        // Nine values near 1.0 and one far outlier.
        let mut values = vec![1.0; 9];
        values.push(100.0);
        let trimmed = sigma_trimmed_mean(&values, 1.0).unwrap();
        assert_eq!(trimmed, 1.0);
        // A wide-enough band keeps everything.
        let untrimmed = sigma_trimmed_mean(&values, 100.0).unwrap();
        assert!((untrimmed - 10.9).abs() < 1e-9);
    }
}
