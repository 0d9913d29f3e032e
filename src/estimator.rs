/// Elevation gain estimation pipeline
///
/// raw altitudes → moving average → altitude range → threshold → climb tracker.
/// Everything is in meters until the caller asks for another unit.

use serde::Serialize;
use tracing::debug;

use crate::altitude_trace::AltitudeTrace;
use crate::climb_tracker::{track_climbs, ClimbSegment};
use crate::errors::GainError;
use crate::smoother::{moving_average, WindowAlignment};
use crate::terrain_classifier::{altitude_range, TerrainClass, ThresholdPolicy};

pub const FEET_PER_METER: f64 = 3.28084;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GainUnit {
    Meters,
    Feet,
}

impl GainUnit {
    pub fn convert(self, meters: f64) -> f64 {
        match self {
            GainUnit::Meters => meters,
            GainUnit::Feet => meters * FEET_PER_METER,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            GainUnit::Meters => "m",
            GainUnit::Feet => "ft",
        }
    }
}

/// Result of one estimation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GainEstimate {
    pub gain_m: f64,
    pub threshold_m: f64,
    /// Range of the smoothed series, which drove the threshold choice.
    pub altitude_range_m: f64,
    pub terrain: Option<TerrainClass>,
    pub segments: Vec<ClimbSegment>,
    pub sample_count: usize,
}

impl GainEstimate {
    pub fn gain(&self, unit: GainUnit) -> f64 {
        unit.convert(self.gain_m)
    }

    pub fn gain_feet(&self) -> f64 {
        self.gain(GainUnit::Feet)
    }

    pub fn climb_count(&self) -> usize {
        self.segments.len()
    }
}

/// Pure, reusable estimator. Holds no per-activity state, so one instance
/// can be shared across threads.
pub struct ElevationEstimator {
    smoothing_window: usize,
    alignment: WindowAlignment,
    policy: Box<dyn ThresholdPolicy>,
}

impl ElevationEstimator {
    pub fn new(
        smoothing_window: usize,
        alignment: WindowAlignment,
        policy: Box<dyn ThresholdPolicy>,
    ) -> Result<Self, GainError> {
        if smoothing_window == 0 {
            return Err(GainError::InvalidConfiguration(
                "smoothing window must be a positive number of samples".to_string(),
            ));
        }
        Ok(ElevationEstimator {
            smoothing_window,
            alignment,
            policy,
        })
    }

    pub fn smoothing_window(&self) -> usize {
        self.smoothing_window
    }

    pub fn estimate(&self, trace: &AltitudeTrace) -> GainEstimate {
        self.estimate_altitudes(&trace.altitudes())
    }

    /// Run the pipeline on bare altitudes. Callers are expected to have
    /// validated them; use `estimate` with an `AltitudeTrace` otherwise.
    pub fn estimate_altitudes(&self, altitudes: &[f64]) -> GainEstimate {
        let smoothed = moving_average(altitudes, self.smoothing_window, self.alignment);
        let range = altitude_range(&smoothed);
        let threshold = self.policy.threshold_for_range(range);
        let terrain = self.policy.classify(range);

        let (gain_m, segments) = track_climbs(&smoothed, threshold);

        debug!(
            samples = altitudes.len(),
            window = self.smoothing_window,
            range_m = range,
            threshold_m = threshold.meters(),
            climbs = segments.len(),
            gain_m,
            "estimated elevation gain"
        );

        GainEstimate {
            gain_m,
            threshold_m: threshold.meters(),
            altitude_range_m: range,
            terrain,
            segments,
            sample_count: altitudes.len(),
        }
    }
}

/// Where a reported gain value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GainSource {
    /// Trusted value from the data source, used as-is.
    Reference,
    /// Computed from the altitude trace.
    Estimated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedGain {
    pub gain_m: f64,
    pub source: GainSource,
}

/// Prefer a trusted reference gain, fall back to the estimate.
///
/// Returns `None` when neither is available. That is "no estimate", which
/// must not be confused with a legitimate zero from flat terrain.
pub fn resolve_gain(reference_m: Option<f64>, estimate: Option<&GainEstimate>) -> Option<ResolvedGain> {
    if let Some(reference) = reference_m.filter(|r| r.is_finite() && *r >= 0.0) {
        return Some(ResolvedGain {
            gain_m: reference,
            source: GainSource::Reference,
        });
    }
    estimate.map(|e| ResolvedGain {
        gain_m: e.gain_m,
        source: GainSource::Estimated,
    })
}
