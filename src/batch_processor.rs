/// Batch elevation gain processing
///
/// Walks a folder of activity files, estimates each one in parallel,
/// compares against reference gains where available and exports one CSV
/// row per activity. An activity that cannot be estimated gets empty gain
/// cells and an error status, never a zero.

use std::path::{Path, PathBuf};

use csv::Writer;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::estimator::{resolve_gain, ElevationEstimator, GainEstimate, GainSource, FEET_PER_METER};
use crate::reference_data::{error_percent, ReferenceData};
use crate::track_reader::{is_altitude_csv, read_track, TrackFormat};

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Report the trusted reference gain instead of the estimate when one exists.
    pub prefer_reference: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityResult {
    pub filename: String,
    pub activity_name: String,
    pub samples: usize,
    pub distance_km: Option<f64>,
    pub altitude_range_m: Option<f64>,
    pub terrain: Option<String>,
    pub threshold_m: Option<f64>,
    pub climbs: Option<usize>,
    pub estimated_gain_m: Option<f64>,
    pub estimated_gain_ft: Option<f64>,
    /// Estimated meters climbed per kilometer; empty without a distance.
    pub gain_per_km_m: Option<f64>,
    pub reference_gain_m: Option<f64>,
    pub error_percent: Option<f64>,
    pub reported_gain_m: Option<f64>,
    pub reported_gain_ft: Option<f64>,
    pub reported_source: Option<GainSource>,
    pub status: String,
}

impl ActivityResult {
    fn blank(filename: String, status: String) -> Self {
        ActivityResult {
            filename,
            activity_name: String::new(),
            samples: 0,
            distance_km: None,
            altitude_range_m: None,
            terrain: None,
            threshold_m: None,
            climbs: None,
            estimated_gain_m: None,
            estimated_gain_ft: None,
            gain_per_km_m: None,
            reference_gain_m: None,
            error_percent: None,
            reported_gain_m: None,
            reported_gain_ft: None,
            reported_source: None,
            status,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// All supported track files under a folder, sorted by path.
///
/// CSV files only count when they carry an `altitude_m` column, so result
/// exports and reference tables sitting in the same folder are skipped.
pub fn collect_track_files(folder: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        match TrackFormat::from_path(entry.path()) {
            Some(TrackFormat::Csv) if !is_altitude_csv(entry.path()) => {
                debug!(path = %entry.path().display(), "skipping CSV without altitude_m column");
            }
            Some(_) => files.push(entry.path().to_path_buf()),
            None => {}
        }
    }
    Ok(files)
}

pub fn process_activity(
    path: &Path,
    estimator: &ElevationEstimator,
    references: &ReferenceData,
    options: BatchOptions,
) -> ActivityResult {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let reference_m = references.get(&filename).map(|r| r.gain_m);

    let outcome = read_track(path).and_then(|track| {
        let trace = track.trace()?;
        Ok((track, estimator.estimate(&trace)))
    });

    match outcome {
        Ok((track, estimate)) => {
            let mut result = ActivityResult::blank(filename, "ok".to_string());
            result.activity_name = track.name.clone();
            result.samples = estimate.sample_count;
            result.distance_km = track.distance_km();
            fill_estimate(&mut result, &estimate);
            result.gain_per_km_m = gain_per_km(estimate.gain_m, result.distance_km);
            fill_reported(&mut result, reference_m, Some(&estimate), options);
            result
        }
        Err(e) => {
            if e.is_activity_error() {
                warn!(file = %filename, "no estimate available: {}", e);
            } else {
                error!(file = %filename, "failed to read activity: {}", e);
            }
            let mut result = ActivityResult::blank(filename, format!("error: {}", e));
            fill_reported(&mut result, reference_m, None, options);
            result
        }
    }
}

fn fill_estimate(result: &mut ActivityResult, estimate: &GainEstimate) {
    result.altitude_range_m = Some(estimate.altitude_range_m);
    result.terrain = estimate.terrain.as_ref().map(|t| t.label.clone());
    result.threshold_m = Some(estimate.threshold_m);
    result.climbs = Some(estimate.climb_count());
    result.estimated_gain_m = Some(estimate.gain_m);
    result.estimated_gain_ft = Some(estimate.gain_feet());
}

/// Gain per kilometer, or `None` when the distance is unknown or zero.
pub fn gain_per_km(gain_m: f64, distance_km: Option<f64>) -> Option<f64> {
    distance_km
        .filter(|km| km.is_finite() && *km > 0.0)
        .map(|km| gain_m / km)
}

fn fill_reported(
    result: &mut ActivityResult,
    reference_m: Option<f64>,
    estimate: Option<&GainEstimate>,
    options: BatchOptions,
) {
    result.reference_gain_m = reference_m;
    result.error_percent = match (estimate, reference_m) {
        (Some(e), Some(r)) => error_percent(e.gain_m, r),
        _ => None,
    };

    let preferred_reference = if options.prefer_reference { reference_m } else { None };
    if let Some(resolved) = resolve_gain(preferred_reference, estimate) {
        result.reported_gain_m = Some(resolved.gain_m);
        result.reported_gain_ft = Some(resolved.gain_m * FEET_PER_METER);
        result.reported_source = Some(resolved.source);
    }
}

/// Estimate every track file under `folder` in parallel.
pub fn process_folder(
    folder: &Path,
    estimator: &ElevationEstimator,
    references: &ReferenceData,
    options: BatchOptions,
) -> Result<Vec<ActivityResult>, Box<dyn std::error::Error>> {
    let files = collect_track_files(folder)?;

    let results: Vec<ActivityResult> = files
        .par_iter()
        .map(|path| process_activity(path, estimator, references, options))
        .collect();

    Ok(results)
}

pub fn write_results_csv(results: &[ActivityResult], output_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut wtr = Writer::from_path(output_path)?;
    for result in results {
        wtr.serialize(result)?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccuracySummary {
    pub evaluated: usize,
    pub mean_abs_error_percent: f64,
    pub median_abs_error_percent: f64,
    pub within_5_percent: usize,
    pub worst_activity: String,
    pub worst_error_percent: f64,
}

/// Accuracy over the activities that have both an estimate and a reference.
pub fn summarize_accuracy(results: &[ActivityResult]) -> Option<AccuracySummary> {
    let mut errors: Vec<(&str, f64)> = results
        .iter()
        .filter_map(|r| r.error_percent.map(|e| (r.filename.as_str(), e)))
        .collect();

    if errors.is_empty() {
        return None;
    }

    let evaluated = errors.len();
    let mean_abs_error_percent = errors.iter().map(|(_, e)| e.abs()).sum::<f64>() / evaluated as f64;
    let within_5_percent = errors.iter().filter(|(_, e)| e.abs() <= 5.0).count();

    errors.sort_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));
    let median_abs_error_percent = if evaluated % 2 == 1 {
        errors[evaluated / 2].1.abs()
    } else {
        (errors[evaluated / 2 - 1].1.abs() + errors[evaluated / 2].1.abs()) / 2.0
    };
    let (worst_activity, worst_error_percent) = errors[evaluated - 1];

    Some(AccuracySummary {
        evaluated,
        mean_abs_error_percent,
        median_abs_error_percent,
        within_5_percent,
        worst_activity: worst_activity.to_string(),
        worst_error_percent,
    })
}

pub fn print_batch_summary(results: &[ActivityResult]) {
    let processed = results.iter().filter(|r| r.is_ok()).count();

    println!("\n📊 ELEVATION GAIN SUMMARY");
    println!("========================");
    println!("✅ Processed {} out of {} activity files", processed, results.len());

    println!("\n{:<36} {:>8} {:>8} {:>10} {:>10} {:>8}",
             "Activity", "Range m", "Thr m", "Gain ft", "Ref ft", "Err %");
    println!("{}", "-".repeat(86));

    for r in results {
        let fmt = |v: Option<f64>, precision: usize| {
            v.map(|x| format!("{:.*}", precision, x)).unwrap_or_else(|| "-".to_string())
        };
        let name: String = r.filename.chars().take(36).collect();
        println!("{:<36} {:>8} {:>8} {:>10} {:>10} {:>8}",
                 name,
                 fmt(r.altitude_range_m, 1),
                 fmt(r.threshold_m, 1),
                 fmt(r.estimated_gain_ft, 0),
                 fmt(r.reference_gain_m.map(|m| m * FEET_PER_METER), 0),
                 fmt(r.error_percent, 1));
        if !r.is_ok() {
            println!("   ❌ {}", r.status);
        }
    }

    if let Some(summary) = summarize_accuracy(results) {
        println!("\n🎯 Accuracy against reference gains:");
        println!("  Activities evaluated: {}", summary.evaluated);
        println!("  Average error: {:.1}%", summary.mean_abs_error_percent);
        println!("  Median error: {:.1}%", summary.median_abs_error_percent);
        println!("  Within ±5%: {}/{}", summary.within_5_percent, summary.evaluated);
        println!("  Worst: {} ({:+.1}%)", summary.worst_activity, summary.worst_error_percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EstimatorConfig;
    use std::fs;

    fn write_csv_track(dir: &Path, name: &str, altitudes: &[f64]) {
        let mut content = String::from("altitude_m\n");
        for a in altitudes {
            content.push_str(&format!("{}\n", a));
        }
        fs::write(dir.join(name), content).unwrap();
    }

    fn ramp(len: usize, step: f64) -> Vec<f64> {
        (0..len).map(|i| i as f64 * step).collect()
    }

    #[test]
    fn test_collect_track_files_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        write_csv_track(dir.path(), "b.csv", &[1.0, 2.0]);
        fs::create_dir(dir.path().join("nested")).unwrap();
        write_csv_track(&dir.path().join("nested"), "a.csv", &[1.0, 2.0]);
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let files = collect_track_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().unwrap() == "csv"));
    }

    #[test]
    fn test_process_folder_with_references() {
        let dir = tempfile::tempdir().unwrap();
        write_csv_track(dir.path(), "climb.csv", &ramp(200, 1.0));
        write_csv_track(dir.path(), "flat.csv", &vec![50.0; 200]);
        fs::write(dir.path().join("broken.csv"), "altitude_m\n10\noops\n").unwrap();

        let mut references = ReferenceData::default();
        references.insert("climb", 200.0, "test");
        references.insert("broken", 80.0, "test");

        let estimator = EstimatorConfig::fixed_threshold(1, 2.5).build().unwrap();
        let results = process_folder(dir.path(), &estimator, &references, BatchOptions::default()).unwrap();
        assert_eq!(results.len(), 3);

        let climb = results.iter().find(|r| r.filename == "climb.csv").unwrap();
        assert!(climb.is_ok());
        assert_eq!(climb.estimated_gain_m, Some(199.0));
        assert!((climb.error_percent.unwrap() - (-0.5)).abs() < 1e-9);
        assert_eq!(climb.reported_source, Some(GainSource::Estimated));

        // Zero gain is a real result for flat terrain
        let flat = results.iter().find(|r| r.filename == "flat.csv").unwrap();
        assert_eq!(flat.estimated_gain_m, Some(0.0));

        // Failure means no estimate, not zero
        let broken = results.iter().find(|r| r.filename == "broken.csv").unwrap();
        assert!(!broken.is_ok());
        assert_eq!(broken.estimated_gain_m, None);
        assert_eq!(broken.reported_gain_m, None);
    }

    #[test]
    fn test_gain_per_km_needs_distance() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("rise.tcx"),
            r#"<TrainingCenterDatabase><Activities><Activity><Lap><Track>
<Trackpoint><AltitudeMeters>100.0</AltitudeMeters><DistanceMeters>0.0</DistanceMeters></Trackpoint>
<Trackpoint><AltitudeMeters>105.0</AltitudeMeters><DistanceMeters>250.0</DistanceMeters></Trackpoint>
<Trackpoint><AltitudeMeters>110.0</AltitudeMeters><DistanceMeters>500.0</DistanceMeters></Trackpoint>
</Track></Lap></Activity></Activities></TrainingCenterDatabase>"#,
        )
        .unwrap();
        write_csv_track(dir.path(), "no_distance.csv", &ramp(50, 1.0));

        let estimator = EstimatorConfig::fixed_threshold(1, 2.5).build().unwrap();
        let results =
            process_folder(dir.path(), &estimator, &ReferenceData::default(), BatchOptions::default()).unwrap();

        let rise = results.iter().find(|r| r.filename == "rise.tcx").unwrap();
        assert_eq!(rise.estimated_gain_m, Some(10.0));
        assert_eq!(rise.distance_km, Some(0.5));
        assert_eq!(rise.gain_per_km_m, Some(20.0));

        // No distance means an empty cell, not a zero rate
        let bare = results.iter().find(|r| r.filename == "no_distance.csv").unwrap();
        assert_eq!(bare.estimated_gain_m, Some(49.0));
        assert_eq!(bare.gain_per_km_m, None);

        assert_eq!(gain_per_km(30.0, Some(0.0)), None);
        assert_eq!(gain_per_km(30.0, Some(1.5)), Some(20.0));
    }

    #[test]
    fn test_results_and_reference_csvs_are_not_tracks() {
        let dir = tempfile::tempdir().unwrap();
        write_csv_track(dir.path(), "climb.csv", &ramp(20, 1.0));
        fs::write(dir.path().join("references.csv"), "activity,reference_gain\nclimb,19\n").unwrap();

        let estimator = EstimatorConfig::fixed_threshold(1, 2.5).build().unwrap();
        let first = process_folder(dir.path(), &estimator, &ReferenceData::default(), BatchOptions::default()).unwrap();
        write_results_csv(&first, &dir.path().join("elevation_gain_results.csv")).unwrap();

        // A second run over the same folder sees only the track
        let files = collect_track_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("climb.csv")]);

        let second = process_folder(dir.path(), &estimator, &ReferenceData::default(), BatchOptions::default()).unwrap();
        assert_eq!(second.len(), 1);
        assert!(second[0].is_ok());
    }

    #[test]
    fn test_prefer_reference_reports_trusted_value() {
        let dir = tempfile::tempdir().unwrap();
        write_csv_track(dir.path(), "climb.csv", &ramp(50, 1.0));
        fs::write(dir.path().join("broken.csv"), "altitude_m\n").unwrap();

        let mut references = ReferenceData::default();
        references.insert("climb.csv", 68.3, "vendor");
        references.insert("broken.csv", 12.0, "vendor");

        let estimator = EstimatorConfig::fixed_threshold(1, 2.5).build().unwrap();
        let options = BatchOptions { prefer_reference: true };

        let climb = process_activity(&dir.path().join("climb.csv"), &estimator, &references, options);
        assert_eq!(climb.estimated_gain_m, Some(49.0));
        assert_eq!(climb.reported_gain_m, Some(68.3));
        assert_eq!(climb.reported_source, Some(GainSource::Reference));

        let broken = process_activity(&dir.path().join("broken.csv"), &estimator, &references, options);
        assert_eq!(broken.estimated_gain_m, None);
        assert_eq!(broken.reported_gain_m, Some(12.0));
    }

    #[test]
    fn test_summarize_accuracy() {
        let mut results = Vec::new();
        for (name, err) in [("a", 2.0), ("b", -10.0), ("c", 4.0), ("d", 30.0)] {
            let mut r = ActivityResult::blank(name.to_string(), "ok".to_string());
            r.error_percent = Some(err);
            results.push(r);
        }
        results.push(ActivityResult::blank("e".to_string(), "error: empty".to_string()));

        let summary = summarize_accuracy(&results).unwrap();
        assert_eq!(summary.evaluated, 4);
        assert!((summary.mean_abs_error_percent - 11.5).abs() < 1e-9);
        assert!((summary.median_abs_error_percent - 7.0).abs() < 1e-9);
        assert_eq!(summary.within_5_percent, 2);
        assert_eq!(summary.worst_activity, "d");

        assert!(summarize_accuracy(&[]).is_none());
    }

    #[test]
    fn test_write_results_csv_leaves_missing_values_empty() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("results.csv");

        let results = vec![ActivityResult::blank("bad.gpx".to_string(), "error: parse".to_string())];
        write_results_csv(&results, &output).unwrap();

        let content = fs::read_to_string(&output).unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().starts_with("filename,activity_name,samples"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("bad.gpx,,0,,"));
        assert!(!row.contains(",0.0,"));
    }
}
