/// Terrain classification and threshold selection
///
/// The whole activity is reduced to one feature, its altitude range, and
/// that range picks a climb threshold. This is a coarse heuristic: two
/// activities with the same range have needed thresholds an order of
/// magnitude apart. It sits behind `ThresholdPolicy` so it can be swapped
/// for a better predictor without touching the tracker.

use serde::{Deserialize, Serialize};

use crate::climb_tracker::ClimbThreshold;
use crate::errors::GainError;

/// Maps an altitude range (meters) to a climb threshold.
pub trait ThresholdPolicy: Send + Sync {
    fn threshold_for_range(&self, altitude_range_m: f64) -> ClimbThreshold;

    /// Terrain class for reporting. Policies without classes return `None`.
    fn classify(&self, _altitude_range_m: f64) -> Option<TerrainClass> {
        None
    }
}

/// One row of the bucket table. `upper_bound_m = None` is the catch-all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainBucket {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound_m: Option<f64>,
    pub threshold_m: f64,
}

impl TerrainBucket {
    pub fn bounded(label: &str, upper_bound_m: f64, threshold_m: f64) -> Self {
        TerrainBucket {
            label: label.to_string(),
            upper_bound_m: Some(upper_bound_m),
            threshold_m,
        }
    }

    pub fn catch_all(label: &str, threshold_m: f64) -> Self {
        TerrainBucket {
            label: label.to_string(),
            upper_bound_m: None,
            threshold_m,
        }
    }
}

/// Terrain class picked for an activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerrainClass {
    /// Position in the bucket table, 0 = flattest.
    pub tier: usize,
    pub label: String,
    pub threshold_m: f64,
}

/// Ordered, validated bucket table. Built through `TerrainBuckets::new`.
#[derive(Debug, Clone)]
pub struct TerrainBuckets {
    buckets: Vec<(Option<f64>, ClimbThreshold, String)>,
}

impl TerrainBuckets {
    /// Bounds must be strictly ascending and the last bucket must be the
    /// catch-all, which makes the mapping total.
    pub fn new(buckets: &[TerrainBucket]) -> Result<Self, GainError> {
        if buckets.is_empty() {
            return Err(GainError::InvalidConfiguration(
                "terrain bucket table is empty".to_string(),
            ));
        }

        let mut validated = Vec::with_capacity(buckets.len());
        let mut previous_bound = f64::NEG_INFINITY;

        for (i, bucket) in buckets.iter().enumerate() {
            let is_last = i + 1 == buckets.len();
            match (bucket.upper_bound_m, is_last) {
                (None, true) => {}
                (None, false) => {
                    return Err(GainError::InvalidConfiguration(format!(
                        "bucket '{}' has no upper bound but is not the last bucket",
                        bucket.label
                    )));
                }
                (Some(_), true) => {
                    return Err(GainError::InvalidConfiguration(format!(
                        "last bucket '{}' must have no upper bound",
                        bucket.label
                    )));
                }
                (Some(bound), false) => {
                    if !bound.is_finite() || bound <= previous_bound {
                        return Err(GainError::InvalidConfiguration(format!(
                            "bucket '{}' upper bound {} is not strictly ascending",
                            bucket.label, bound
                        )));
                    }
                    previous_bound = bound;
                }
            }

            let threshold = ClimbThreshold::new(bucket.threshold_m)?;
            validated.push((bucket.upper_bound_m, threshold, bucket.label.clone()));
        }

        Ok(TerrainBuckets { buckets: validated })
    }

    fn tier_for_range(&self, altitude_range_m: f64) -> usize {
        self.buckets
            .iter()
            .position(|(bound, _, _)| match bound {
                Some(upper) => altitude_range_m < *upper,
                None => true,
            })
            .unwrap_or(self.buckets.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl ThresholdPolicy for TerrainBuckets {
    fn threshold_for_range(&self, altitude_range_m: f64) -> ClimbThreshold {
        self.buckets[self.tier_for_range(altitude_range_m)].1
    }

    fn classify(&self, altitude_range_m: f64) -> Option<TerrainClass> {
        let tier = self.tier_for_range(altitude_range_m);
        let (_, threshold, label) = &self.buckets[tier];
        Some(TerrainClass {
            tier,
            label: label.clone(),
            threshold_m: threshold.meters(),
        })
    }
}

/// Same threshold for every activity.
#[derive(Debug, Clone, Copy)]
pub struct FlatThreshold(pub ClimbThreshold);

impl ThresholdPolicy for FlatThreshold {
    fn threshold_for_range(&self, _altitude_range_m: f64) -> ClimbThreshold {
        self.0
    }
}

/// max - min over the series, 0 for an empty series.
pub fn altitude_range(altitudes: &[f64]) -> f64 {
    if altitudes.is_empty() {
        return 0.0;
    }
    let max = altitudes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = altitudes.iter().cloned().fold(f64::INFINITY, f64::min);
    max - min
}
