//! Elevation gain estimation for recorded activities.
//!
//! GPS altitude is noisy enough that summing every positive delta overstates
//! climbing several times over on flat routes. The estimator smooths the
//! trace with a moving average, picks a climb threshold from the trace's
//! altitude range and counts only climbs that clear that threshold.
//!
//! ```no_run
//! use climb_gain::{AltitudeTrace, EstimatorConfig};
//!
//! let estimator = EstimatorConfig::default().build()?;
//! let trace = AltitudeTrace::from_altitudes(&[101.0, 103.5, 108.0, 112.0])?;
//! let estimate = estimator.estimate(&trace);
//! println!("{:.0} ft", estimate.gain_feet());
//! # Ok::<(), climb_gain::GainError>(())
//! ```

pub mod altitude_trace;
pub mod batch_processor;
pub mod climb_tracker;
pub mod config;
pub mod errors;
pub mod estimator;
pub mod parameter_sweep;
pub mod reference_data;
pub mod smoother;
pub mod terrain_classifier;
pub mod track_reader;

pub use altitude_trace::{AltitudeSample, AltitudeTrace};
pub use climb_tracker::{track_climbs, ClimbSegment, ClimbThreshold, ClimbTracker};
pub use config::EstimatorConfig;
pub use errors::GainError;
pub use estimator::{resolve_gain, ElevationEstimator, GainEstimate, GainSource, GainUnit, FEET_PER_METER};
pub use smoother::{moving_average, WindowAlignment};
pub use terrain_classifier::{altitude_range, FlatThreshold, TerrainBucket, TerrainBuckets, TerrainClass, ThresholdPolicy};
