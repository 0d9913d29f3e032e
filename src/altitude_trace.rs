/// Validated altitude trace for one activity.
///
/// The estimator assumes a clean, time-ordered numeric series. Anything
/// else is turned away here with `GainError::InvalidInput`.

use serde::{Deserialize, Serialize};

use crate::errors::GainError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AltitudeSample {
    /// Seconds since the first sample, or the sample index when the source has no clock.
    pub offset: f64,
    pub altitude_m: f64,
}

impl AltitudeSample {
    pub fn new(offset: f64, altitude_m: f64) -> Self {
        AltitudeSample { offset, altitude_m }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AltitudeTrace {
    samples: Vec<AltitudeSample>,
}

impl AltitudeTrace {
    pub fn new(samples: Vec<AltitudeSample>) -> Result<Self, GainError> {
        if samples.is_empty() {
            return Err(GainError::InvalidInput("altitude trace is empty".to_string()));
        }

        for (i, sample) in samples.iter().enumerate() {
            if !sample.altitude_m.is_finite() {
                return Err(GainError::InvalidInput(format!(
                    "sample {} has non-numeric altitude {}",
                    i, sample.altitude_m
                )));
            }
            if !sample.offset.is_finite() {
                return Err(GainError::InvalidInput(format!(
                    "sample {} has non-numeric time offset {}",
                    i, sample.offset
                )));
            }
        }

        if let Some(i) = samples.windows(2).position(|w| w[1].offset < w[0].offset) {
            return Err(GainError::InvalidInput(format!(
                "samples out of order: offset {} follows {} at position {}",
                samples[i + 1].offset,
                samples[i].offset,
                i + 1
            )));
        }

        Ok(AltitudeTrace { samples })
    }

    /// Trace indexed by position, for sources that only give altitudes.
    pub fn from_altitudes(altitudes: &[f64]) -> Result<Self, GainError> {
        Self::new(
            altitudes
                .iter()
                .enumerate()
                .map(|(i, &a)| AltitudeSample::new(i as f64, a))
                .collect(),
        )
    }

    pub fn samples(&self) -> &[AltitudeSample] {
        &self.samples
    }

    pub fn altitudes(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.altitude_m).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Span of the offset axis (seconds for timed traces).
    pub fn duration(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.offset - first.offset,
            _ => 0.0,
        }
    }
}
