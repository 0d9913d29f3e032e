/// Moving-average altitude smoother
///
/// GPS altitude carries decimeter-to-meter jitter on every sample. Averaging
/// over a window of neighbouring points removes most of it, at the cost of
/// smearing short sharp features. Boundary windows are clipped instead of
/// padded, so the output always has the same length as the input.

use serde::{Deserialize, Serialize};

/// Where the averaging window sits relative to the output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowAlignment {
    /// Window straddles the index (extra point goes before it for even sizes).
    #[default]
    Centered,
    /// Window ends at the index, like a live rolling mean.
    Trailing,
}

impl WindowAlignment {
    /// Number of points taken before and after the index for a window size.
    fn reach(self, window: usize) -> (usize, usize) {
        match self {
            WindowAlignment::Centered => {
                let before = window / 2;
                (before, window - 1 - before)
            }
            WindowAlignment::Trailing => (window - 1, 0),
        }
    }
}

/// Smooth an altitude series with a clipped moving average.
///
/// A window of 0 is treated as 1. When the window covers the whole series
/// every output is the mean of the full series, whatever the alignment.
pub fn moving_average(altitudes: &[f64], window: usize, alignment: WindowAlignment) -> Vec<f64> {
    let len = altitudes.len();
    if len == 0 {
        return Vec::new();
    }

    let window = window.max(1);
    if window >= len {
        let mean = altitudes.iter().sum::<f64>() / len as f64;
        return vec![mean; len];
    }
    if window == 1 {
        return altitudes.to_vec();
    }

    let (before, after) = alignment.reach(window);
    let mut smoothed = Vec::with_capacity(len);

    for i in 0..len {
        let start = i.saturating_sub(before);
        let end = (i + after).min(len - 1);

        let sum: f64 = altitudes[start..=end].iter().sum();
        let count = end - start + 1;

        smoothed.push(sum / count as f64);
    }

    smoothed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_one_is_passthrough() {
        let altitudes = vec![100.0, 101.5, 99.0, 104.0];
        assert_eq!(moving_average(&altitudes, 1, WindowAlignment::Centered), altitudes);
        assert_eq!(moving_average(&altitudes, 1, WindowAlignment::Trailing), altitudes);
    }

    #[test]
    fn test_output_length_matches_input() {
        let altitudes: Vec<f64> = (0..57).map(|i| (i as f64 * 0.3).sin() * 10.0).collect();
        for window in [2, 4, 13, 20, 30] {
            assert_eq!(moving_average(&altitudes, window, WindowAlignment::Centered).len(), 57);
            assert_eq!(moving_average(&altitudes, window, WindowAlignment::Trailing).len(), 57);
        }
    }

    #[test]
    fn test_centered_window_values() {
        let altitudes = vec![0.0, 3.0, 6.0, 9.0, 12.0];
        let smoothed = moving_average(&altitudes, 3, WindowAlignment::Centered);

        // Edges use the clipped two-point window
        assert_eq!(smoothed[0], 1.5);
        assert_eq!(smoothed[1], 3.0);
        assert_eq!(smoothed[2], 6.0);
        assert_eq!(smoothed[3], 9.0);
        assert_eq!(smoothed[4], 10.5);
    }

    #[test]
    fn test_trailing_window_values() {
        let altitudes = vec![0.0, 2.0, 4.0, 6.0];
        let smoothed = moving_average(&altitudes, 2, WindowAlignment::Trailing);
        assert_eq!(smoothed, vec![0.0, 1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_window_longer_than_series() {
        let ramp = vec![0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(moving_average(&ramp, 30, WindowAlignment::Centered), vec![20.0; 5]);
        assert_eq!(moving_average(&ramp, 30, WindowAlignment::Trailing), vec![20.0; 5]);

        // Window exactly the series length
        assert_eq!(moving_average(&ramp, 5, WindowAlignment::Centered), vec![20.0; 5]);

        let single = moving_average(&[42.0], 30, WindowAlignment::Trailing);
        assert_eq!(single, vec![42.0]);
    }

    #[test]
    fn test_zero_window_and_empty_input() {
        assert!(moving_average(&[], 5, WindowAlignment::Centered).is_empty());
        assert_eq!(moving_average(&[1.0, 2.0], 0, WindowAlignment::Centered), vec![1.0, 2.0]);
    }

    #[test]
    fn test_smoothing_reduces_jitter() {
        let noisy: Vec<f64> = (0..200)
            .map(|i| 100.0 + if i % 2 == 0 { 0.8 } else { -0.8 })
            .collect();
        let smoothed = moving_average(&noisy, 10, WindowAlignment::Centered);

        let spread = |v: &[f64]| {
            v.iter().cloned().fold(f64::MIN, f64::max) - v.iter().cloned().fold(f64::MAX, f64::min)
        };
        assert!(spread(&smoothed[10..190]) < spread(&noisy) / 10.0);
    }
}
