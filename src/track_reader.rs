/// Activity track readers
///
/// Turns GPX, TCX and plain CSV altitude series into `ActivityTrack`s.
/// Trackpoints without an altitude are skipped. When every kept point has
/// a timestamp the sample offset is seconds since the first point,
/// otherwise it falls back to the point index.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use geo::{point, HaversineDistance};
use gpx::read;
use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::debug;

use crate::altitude_trace::{AltitudeSample, AltitudeTrace};
use crate::errors::GainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    Gpx,
    Tcx,
    Csv,
}

impl TrackFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "gpx" => Some(TrackFormat::Gpx),
            "tcx" => Some(TrackFormat::Tcx),
            "csv" => Some(TrackFormat::Csv),
            _ => None,
        }
    }
}

/// Altitude series plus the bits of metadata the reports use.
#[derive(Debug, Clone)]
pub struct ActivityTrack {
    pub name: String,
    pub samples: Vec<AltitudeSample>,
    /// Total distance when the source carries positions or distances.
    pub distance_m: Option<f64>,
}

impl ActivityTrack {
    pub fn trace(&self) -> Result<AltitudeTrace, GainError> {
        AltitudeTrace::new(self.samples.clone())
    }

    pub fn distance_km(&self) -> Option<f64> {
        self.distance_m.map(|d| d / 1000.0)
    }
}

/// Read any supported track file, dispatching on the extension.
pub fn read_track(path: &Path) -> Result<ActivityTrack, GainError> {
    let format = TrackFormat::from_path(path)
        .ok_or_else(|| GainError::UnsupportedFormat(path.display().to_string()))?;

    let fallback_name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("unknown")
        .to_string();

    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut track = match format {
        TrackFormat::Gpx => read_gpx(reader)?,
        TrackFormat::Tcx => {
            let mut content = String::new();
            reader.read_to_string(&mut content)?;
            parse_tcx(&content)?
        }
        TrackFormat::Csv => read_altitude_csv(reader)?,
    };

    if track.name.is_empty() {
        track.name = fallback_name;
    }

    debug!(
        path = %path.display(),
        samples = track.samples.len(),
        "read activity track"
    );

    if track.samples.is_empty() {
        return Err(GainError::InvalidInput(format!(
            "no altitude data found in {}",
            path.display()
        )));
    }

    Ok(track)
}

pub fn read_gpx<R: Read>(reader: R) -> Result<ActivityTrack, GainError> {
    let gpx = read(reader).map_err(|e| GainError::Parse(format!("GPX parse error: {}", e)))?;

    let name = gpx
        .tracks
        .iter()
        .find_map(|t| t.name.clone())
        .unwrap_or_default();

    let mut coords: Vec<(f64, f64)> = Vec::new();
    let mut altitudes = Vec::new();
    let mut times = Vec::new();

    for track in gpx.tracks {
        for segment in track.segments {
            for pt in segment.points {
                if let Some(ele) = pt.elevation {
                    coords.push((pt.point().y(), pt.point().x()));
                    altitudes.push(ele);
                    times.push(pt.time.and_then(|t| t.format().ok()).and_then(|s| parse_timestamp(&s)));
                }
            }
        }
    }

    let distance_m = if coords.len() > 1 {
        let mut total = 0.0;
        for w in coords.windows(2) {
            let a = point!(x: w[0].1, y: w[0].0);
            let b = point!(x: w[1].1, y: w[1].0);
            total += a.haversine_distance(&b);
        }
        Some(total)
    } else {
        None
    };

    Ok(ActivityTrack {
        name,
        samples: build_samples(&altitudes, &times),
        distance_m,
    })
}

pub fn parse_tcx(content: &str) -> Result<ActivityTrack, GainError> {
    let tcx: TrainingCenterDatabase =
        from_str(content).map_err(|e| GainError::Parse(format!("TCX parse error: {}", e)))?;

    let mut name = String::new();
    let mut altitudes = Vec::new();
    let mut times = Vec::new();
    let mut distance_m: Option<f64> = None;

    if let Some(activities) = tcx.activities {
        for activity in activities.activity {
            if name.is_empty() {
                name = activity.notes.or(activity.id).unwrap_or_default();
            }
            for lap in activity.lap {
                for track in lap.track {
                    for trackpoint in track.trackpoint {
                        if let Some(distance) = trackpoint.distance_meters {
                            distance_m = Some(distance_m.map_or(distance, |d: f64| d.max(distance)));
                        }
                        if let Some(altitude) = trackpoint.altitude_meters {
                            altitudes.push(altitude);
                            times.push(trackpoint.time.as_deref().and_then(parse_timestamp));
                        }
                    }
                }
            }
        }
    }

    Ok(ActivityTrack {
        name,
        samples: build_samples(&altitudes, &times),
        distance_m,
    })
}

#[derive(Debug, Deserialize)]
struct CsvAltitudeRow {
    #[serde(default)]
    offset: Option<f64>,
    altitude_m: f64,
}

/// CSV with an `altitude_m` column and an optional `offset` column.
pub fn read_altitude_csv<R: Read>(reader: R) -> Result<ActivityTrack, GainError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut samples = Vec::new();

    for (i, result) in rdr.deserialize::<CsvAltitudeRow>().enumerate() {
        let row = result
            .map_err(|e| GainError::InvalidInput(format!("row {}: {}", i + 1, e)))?;
        samples.push(AltitudeSample::new(row.offset.unwrap_or(i as f64), row.altitude_m));
    }

    Ok(ActivityTrack {
        name: String::new(),
        samples,
        distance_m: None,
    })
}

/// True when the CSV at `path` has an `altitude_m` header column.
pub fn is_altitude_csv(path: &Path) -> bool {
    let mut rdr = match csv::Reader::from_path(path) {
        Ok(rdr) => rdr,
        Err(_) => return false,
    };
    let has_altitude = match rdr.headers() {
        Ok(headers) => headers.iter().any(|h| h.trim() == "altitude_m"),
        Err(_) => false,
    };
    has_altitude
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn build_samples(altitudes: &[f64], times: &[Option<DateTime<Utc>>]) -> Vec<AltitudeSample> {
    let first_time = times.first().copied().flatten();
    let all_timed = !times.is_empty() && times.iter().all(|t| t.is_some());

    altitudes
        .iter()
        .zip(times)
        .enumerate()
        .map(|(i, (&altitude, time))| {
            let offset = match (all_timed, time, first_time) {
                (true, Some(t), Some(t0)) => (*t - t0).num_milliseconds() as f64 / 1000.0,
                _ => i as f64,
            };
            AltitudeSample::new(offset, altitude)
        })
        .collect()
}

// TCX XML structures

#[derive(Debug, Deserialize)]
#[serde(rename = "TrainingCenterDatabase")]
struct TrainingCenterDatabase {
    #[serde(rename = "Activities")]
    activities: Option<Activities>,
}

#[derive(Debug, Deserialize)]
struct Activities {
    #[serde(rename = "Activity", default)]
    activity: Vec<Activity>,
}

#[derive(Debug, Deserialize)]
struct Activity {
    #[serde(rename = "Id")]
    id: Option<String>,
    #[serde(rename = "Notes")]
    notes: Option<String>,
    #[serde(rename = "Lap", default)]
    lap: Vec<Lap>,
}

#[derive(Debug, Deserialize)]
struct Lap {
    #[serde(rename = "Track", default)]
    track: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    #[serde(rename = "Trackpoint", default)]
    trackpoint: Vec<Trackpoint>,
}

#[derive(Debug, Deserialize)]
struct Trackpoint {
    #[serde(rename = "Time")]
    time: Option<String>,
    #[serde(rename = "AltitudeMeters")]
    altitude_meters: Option<f64>,
    #[serde(rename = "DistanceMeters")]
    distance_meters: Option<f64>,
}
