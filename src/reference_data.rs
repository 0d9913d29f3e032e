/// Trusted reference elevation gains
///
/// A CSV of gains reported by a source we trust (a vendor's own number,
/// a surveyed course). Used both to report the trusted value instead of
/// an estimate and to measure estimator accuracy.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::GainError;
use crate::estimator::FEET_PER_METER;
use crate::track_reader::TrackFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceUnit {
    #[default]
    #[serde(alias = "meters")]
    M,
    #[serde(alias = "feet")]
    Ft,
}

#[derive(Debug, Deserialize)]
struct ReferenceRecord {
    activity: String,
    reference_gain: f64,
    #[serde(default)]
    unit: Option<ReferenceUnit>,
    #[serde(default)]
    source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceGain {
    pub gain_m: f64,
    pub source: String,
}

/// Reference gains keyed by lowercase activity name.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    gains: HashMap<String, ReferenceGain>,
}

impl ReferenceData {
    pub fn load(path: &Path) -> Result<Self, GainError> {
        let file = File::open(path)?;
        let data = Self::from_reader(file)?;
        info!(path = %path.display(), records = data.len(), "loaded reference gains");
        Ok(data)
    }

    /// Columns: `activity,reference_gain[,unit][,source]`. Bad rows are
    /// logged and skipped so one typo does not sink a whole evaluation.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, GainError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut gains = HashMap::new();

        for result in rdr.deserialize::<ReferenceRecord>() {
            match result {
                Ok(record) => {
                    if !record.reference_gain.is_finite() || record.reference_gain < 0.0 {
                        warn!(activity = %record.activity, "ignoring negative or non-numeric reference gain");
                        continue;
                    }
                    let gain_m = match record.unit.unwrap_or_default() {
                        ReferenceUnit::M => record.reference_gain,
                        ReferenceUnit::Ft => record.reference_gain / FEET_PER_METER,
                    };
                    gains.insert(
                        normalize_key(&record.activity),
                        ReferenceGain {
                            gain_m,
                            source: record.source,
                        },
                    );
                }
                Err(e) => {
                    warn!("error parsing reference record: {}", e);
                }
            }
        }

        Ok(ReferenceData { gains })
    }

    pub fn insert(&mut self, activity: &str, gain_m: f64, source: &str) {
        self.gains.insert(
            normalize_key(activity),
            ReferenceGain {
                gain_m,
                source: source.to_string(),
            },
        );
    }

    /// Look up by activity name or file name; the extension is ignored.
    pub fn get(&self, activity: &str) -> Option<&ReferenceGain> {
        self.gains.get(&normalize_key(activity))
    }

    pub fn len(&self) -> usize {
        self.gains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gains.is_empty()
    }
}

/// Lowercase name with a track file extension removed. Other dots are
/// part of the name ("Loop 1.1" and "Loop 1.2" stay distinct).
fn normalize_key(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let path = Path::new(&lower);
    let stem = match TrackFormat::from_path(path) {
        Some(_) => path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string()),
        None => None,
    };
    stem.unwrap_or(lower)
}

/// Signed error of an estimate against a reference, in percent.
/// `None` when the reference is zero and a percentage means nothing.
pub fn error_percent(estimate_m: f64, reference_m: f64) -> Option<f64> {
    if reference_m <= 0.0 {
        return None;
    }
    Some((estimate_m - reference_m) / reference_m * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_mixed_units() {
        let csv = "activity,reference_gain,unit,source\n\
                   tcx_2025-11-16.tcx,224,ft,strava\n\
                   Berlin Garmin.gpx,73,m,official\n\
                   hill_loop,120,,\n";
        let data = ReferenceData::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(data.len(), 3);
        let strava = data.get("tcx_2025-11-16").unwrap();
        assert!((strava.gain_m - 224.0 / 3.28084).abs() < 1e-9);
        assert_eq!(strava.source, "strava");

        assert_eq!(data.get("berlin garmin.gpx").unwrap().gain_m, 73.0);
        assert_eq!(data.get("HILL_LOOP.csv").unwrap().gain_m, 120.0);
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let csv = "activity,reference_gain\nok,10\nbroken,lots\nnegative,-4\n";
        let data = ReferenceData::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(data.len(), 1);
        assert!(data.get("broken").is_none());
        assert!(data.get("negative").is_none());
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut data = ReferenceData::default();
        assert!(data.is_empty());
        data.insert("Valencia2022.gpx", 46.0, "official");
        assert_eq!(data.get("valencia2022").unwrap().gain_m, 46.0);
    }

    #[test]
    fn test_dotted_activity_names_stay_distinct() {
        let csv = "activity,reference_gain\nLoop 1.1,40\nLoop 1.2,55\nLoop 1.2.gpx,60\n";
        let data = ReferenceData::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(data.len(), 2);
        assert_eq!(data.get("loop 1.1").unwrap().gain_m, 40.0);
        // The file name form of the same activity replaces the bare name
        assert_eq!(data.get("Loop 1.2").unwrap().gain_m, 60.0);
        assert_eq!(data.get("loop 1.2.tcx").unwrap().gain_m, 60.0);
        assert!(data.get("loop 1").is_none());
    }

    #[test]
    fn test_error_percent() {
        assert_eq!(error_percent(110.0, 100.0), Some(10.0));
        assert_eq!(error_percent(50.0, 100.0), Some(-50.0));
        assert_eq!(error_percent(5.0, 0.0), None);
    }
}
