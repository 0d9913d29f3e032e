/// Peak/reset climb tracker
///
/// Walks a smoothed altitude series once. A candidate climb runs from
/// `start` up to the highest `peak` seen since then; it closes when the
/// trace falls at least `threshold` below that peak. Closed climbs whose
/// net gain reaches the threshold are counted, smaller ones are noise.
/// The tracker is unit-agnostic: feed it meters, get meters back.

use serde::Serialize;

use crate::errors::GainError;

/// Minimum net gain (and minimum descent from the peak) that resolves a climb.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct ClimbThreshold(f64);

impl ClimbThreshold {
    /// Accepts only finite, strictly positive values. A zero threshold would
    /// close and reopen a climb on every micro-descent.
    pub fn new(meters: f64) -> Result<Self, GainError> {
        if !meters.is_finite() || meters <= 0.0 {
            return Err(GainError::InvalidConfiguration(format!(
                "climb threshold must be a positive number of meters, got {}",
                meters
            )));
        }
        Ok(ClimbThreshold(meters))
    }

    pub fn meters(self) -> f64 {
        self.0
    }
}

/// A climb that was accepted into the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimbSegment {
    pub start_index: usize,
    pub peak_index: usize,
    pub start_altitude_m: f64,
    pub peak_altitude_m: f64,
}

impl ClimbSegment {
    pub fn gain_m(&self) -> f64 {
        self.peak_altitude_m - self.start_altitude_m
    }
}

/// Transient tracker state for one activity.
#[derive(Debug, Clone)]
pub struct ClimbTracker {
    threshold: f64,
    start: f64,
    start_index: usize,
    peak: f64,
    peak_index: usize,
    total_gain: f64,
    next_index: usize,
    segments: Vec<ClimbSegment>,
}

impl ClimbTracker {
    pub fn new(threshold: ClimbThreshold) -> Self {
        ClimbTracker {
            threshold: threshold.meters(),
            start: 0.0,
            start_index: 0,
            peak: 0.0,
            peak_index: 0,
            total_gain: 0.0,
            next_index: 0,
            segments: Vec::new(),
        }
    }

    /// Feed the next altitude. The first sample opens the first candidate climb.
    pub fn push(&mut self, altitude: f64) {
        let index = self.next_index;
        self.next_index += 1;

        if index == 0 {
            self.reset_at(index, altitude);
            return;
        }

        if altitude > self.peak {
            self.peak = altitude;
            self.peak_index = index;
        } else if self.peak - altitude >= self.threshold {
            self.close_climb();
            // Next climb starts from here, not from the old peak
            self.reset_at(index, altitude);
        }
    }

    /// Running total so far, in the unit the altitudes were given in.
    pub fn total_gain(&self) -> f64 {
        self.total_gain
    }

    pub fn samples_seen(&self) -> usize {
        self.next_index
    }

    /// Flush the climb in progress and return the total with accepted segments.
    pub fn finish(mut self) -> (f64, Vec<ClimbSegment>) {
        if self.next_index > 0 {
            self.close_climb();
        }
        (self.total_gain, self.segments)
    }

    fn reset_at(&mut self, index: usize, altitude: f64) {
        self.start = altitude;
        self.start_index = index;
        self.peak = altitude;
        self.peak_index = index;
    }

    fn close_climb(&mut self) {
        let net_gain = self.peak - self.start;
        if net_gain >= self.threshold {
            self.total_gain += net_gain;
            self.segments.push(ClimbSegment {
                start_index: self.start_index,
                peak_index: self.peak_index,
                start_altitude_m: self.start,
                peak_altitude_m: self.peak,
            });
        }
    }
}

/// Run the tracker over a whole series.
pub fn track_climbs(altitudes: &[f64], threshold: ClimbThreshold) -> (f64, Vec<ClimbSegment>) {
    let mut tracker = ClimbTracker::new(threshold);
    for &altitude in altitudes {
        tracker.push(altitude);
    }
    tracker.finish()
}
