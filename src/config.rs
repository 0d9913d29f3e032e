/// Estimator configuration
///
/// Window size and the threshold table are the only tuning knobs, and both
/// have moved around a lot during tuning, so they live here as data rather
/// than as literals in the pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::climb_tracker::ClimbThreshold;
use crate::errors::GainError;
use crate::estimator::ElevationEstimator;
use crate::smoother::WindowAlignment;
use crate::terrain_classifier::{FlatThreshold, TerrainBucket, TerrainBuckets, ThresholdPolicy};

pub const DEFAULT_SMOOTHING_WINDOW: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Number of samples averaged per smoothed point.
    pub smoothing_window: usize,
    pub window_alignment: WindowAlignment,
    /// Flat threshold in meters. Bypasses the terrain table when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_climb_threshold: Option<f64>,
    /// Ordered (range upper bound, threshold) table used when no flat override is set.
    pub terrain_buckets: Vec<TerrainBucket>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::final_adaptive()
    }
}

impl EstimatorConfig {
    /// 30-point window with the 9 / 10 / 14 m adaptive table.
    pub fn final_adaptive() -> Self {
        EstimatorConfig {
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            window_alignment: WindowAlignment::Centered,
            terrain_buckets: default_terrain_buckets(),
            minimum_climb_threshold: None,
        }
    }

    /// Fixed window and flat threshold, no terrain classification.
    pub fn fixed_threshold(smoothing_window: usize, threshold_m: f64) -> Self {
        EstimatorConfig {
            smoothing_window,
            minimum_climb_threshold: Some(threshold_m),
            ..Self::final_adaptive()
        }
    }

    /// First tuning: 13-point window, flat 10 m.
    pub fn legacy() -> Self {
        Self::fixed_threshold(13, 10.0)
    }

    /// 4-point window, flat 8 m.
    pub fn short_window() -> Self {
        Self::fixed_threshold(4, 8.0)
    }

    /// 30-point window, flat 10 m.
    pub fn wide_window() -> Self {
        Self::fixed_threshold(30, 10.0)
    }

    /// Look up a preset by name, as used on the command line.
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "final" | "final-adaptive" | "adaptive" => Some(Self::final_adaptive()),
            "legacy" => Some(Self::legacy()),
            "short" | "short-window" => Some(Self::short_window()),
            "wide" | "wide-window" => Some(Self::wide_window()),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), GainError> {
        if self.smoothing_window == 0 {
            return Err(GainError::InvalidConfiguration(
                "smoothing window must be a positive number of samples".to_string(),
            ));
        }

        match self.minimum_climb_threshold {
            Some(threshold) => {
                ClimbThreshold::new(threshold)?;
            }
            None => {
                TerrainBuckets::new(&self.terrain_buckets)?;
            }
        }

        Ok(())
    }

    /// Threshold policy described by this config.
    pub fn threshold_policy(&self) -> Result<Box<dyn ThresholdPolicy>, GainError> {
        match self.minimum_climb_threshold {
            Some(threshold) => Ok(Box::new(FlatThreshold(ClimbThreshold::new(threshold)?))),
            None => Ok(Box::new(TerrainBuckets::new(&self.terrain_buckets)?)),
        }
    }

    /// Validate and build a ready estimator.
    pub fn build(&self) -> Result<ElevationEstimator, GainError> {
        self.validate()?;
        ElevationEstimator::new(self.smoothing_window, self.window_alignment, self.threshold_policy()?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, GainError> {
        let config: EstimatorConfig =
            toml::from_str(content).map_err(|e| GainError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, GainError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, GainError> {
        toml::to_string_pretty(self).map_err(|e| GainError::Parse(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), GainError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Short human-readable description for report headers.
    pub fn describe(&self) -> String {
        match self.minimum_climb_threshold {
            Some(threshold) => format!(
                "window={} ({:?}), flat threshold {:.1}m",
                self.smoothing_window, self.window_alignment, threshold
            ),
            None => {
                let tiers: Vec<String> = self
                    .terrain_buckets
                    .iter()
                    .map(|b| match b.upper_bound_m {
                        Some(bound) => format!("<{:.0}m→{:.1}m", bound, b.threshold_m),
                        None => format!("else→{:.1}m", b.threshold_m),
                    })
                    .collect();
                format!(
                    "window={} ({:?}), adaptive [{}]",
                    self.smoothing_window,
                    self.window_alignment,
                    tiers.join(", ")
                )
            }
        }
    }
}

pub fn default_terrain_buckets() -> Vec<TerrainBucket> {
    vec![
        TerrainBucket::bounded("flat", 85.0, 9.0),
        TerrainBucket::bounded("rolling", 100.0, 10.0),
        TerrainBucket::catch_all("hilly", 14.0),
    ]
}
