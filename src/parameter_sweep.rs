/// Estimator parameter sweep
///
/// Grid search over smoothing windows and threshold policies against
/// activities with trusted reference gains. Every candidate is evaluated
/// in parallel and ranked by mean absolute error. The best row is a
/// suggestion for the config file, not ground truth: the reference set is
/// usually small and terrain range is a weak predictor.

use std::path::Path;

use csv::Writer;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::batch_processor::collect_track_files;
use crate::config::{default_terrain_buckets, EstimatorConfig};
use crate::errors::GainError;
use crate::reference_data::{error_percent, ReferenceData};
use crate::terrain_classifier::TerrainBucket;
use crate::track_reader::read_track;

/// One activity with a usable reference gain.
#[derive(Debug, Clone)]
pub struct SweepCase {
    pub name: String,
    pub altitudes: Vec<f64>,
    pub reference_m: f64,
}

pub struct ParameterSpace {
    pub windows: Vec<usize>,
    pub flat_thresholds: Vec<f64>,
    /// Upper bound of the flattest bucket in the adaptive table.
    pub flat_bucket_bounds: Vec<f64>,
    /// Multipliers applied to every threshold of the adaptive table.
    pub bucket_scales: Vec<f64>,
}

impl Default for ParameterSpace {
    fn default() -> Self {
        ParameterSpace {
            windows: vec![4, 13, 20, 30, 45],
            flat_thresholds: vec![2.5, 5.0, 8.0, 10.0, 12.0, 14.0],
            flat_bucket_bounds: vec![50.0, 70.0, 85.0],
            bucket_scales: vec![0.8, 0.9, 1.0, 1.1, 1.25],
        }
    }
}

impl ParameterSpace {
    /// Every config in the grid. Invalid combinations are dropped.
    pub fn candidates(&self) -> Vec<EstimatorConfig> {
        let mut configs = Vec::new();

        for &window in &self.windows {
            for &threshold in &self.flat_thresholds {
                configs.push(EstimatorConfig::fixed_threshold(window, threshold));
            }

            for &bound in &self.flat_bucket_bounds {
                for &scale in &self.bucket_scales {
                    let mut buckets = default_terrain_buckets();
                    buckets[0].upper_bound_m = Some(bound);
                    for bucket in buckets.iter_mut() {
                        bucket.threshold_m *= scale;
                    }
                    configs.push(EstimatorConfig {
                        smoothing_window: window,
                        terrain_buckets: buckets,
                        ..EstimatorConfig::final_adaptive()
                    });
                }
            }
        }

        configs.retain(|c| c.validate().is_ok());
        configs
    }
}

#[derive(Debug, Clone)]
pub struct SweepResult {
    pub config: EstimatorConfig,
    pub mean_abs_error_percent: f64,
    pub max_abs_error_percent: f64,
    pub within_5_percent: usize,
    pub case_errors: Vec<(String, f64)>,
}

#[derive(Debug, Serialize)]
struct SweepOutput {
    rank: usize,
    mean_abs_error_percent: f64,
    max_abs_error_percent: f64,
    within_5_percent: usize,
    smoothing_window: usize,
    flat_threshold_m: Option<f64>,
    buckets: String,
}

/// Read every track under `folder` that has a positive reference gain.
pub fn load_cases(folder: &Path, references: &ReferenceData) -> Result<Vec<SweepCase>, Box<dyn std::error::Error>> {
    let mut cases = Vec::new();

    for path in collect_track_files(folder)? {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        let reference_m = match references.get(&filename) {
            Some(reference) if reference.gain_m > 0.0 => reference.gain_m,
            _ => continue,
        };

        match read_track(&path).and_then(|track| track.trace()) {
            Ok(trace) => cases.push(SweepCase {
                name: filename,
                altitudes: trace.altitudes(),
                reference_m,
            }),
            Err(e) => warn!(file = %filename, "skipping sweep case: {}", e),
        }
    }

    info!(cases = cases.len(), "loaded sweep cases");
    Ok(cases)
}

pub fn evaluate_config(config: &EstimatorConfig, cases: &[SweepCase]) -> Result<SweepResult, GainError> {
    let estimator = config.build()?;

    let case_errors: Vec<(String, f64)> = cases
        .iter()
        .filter_map(|case| {
            let estimate = estimator.estimate_altitudes(&case.altitudes);
            error_percent(estimate.gain_m, case.reference_m).map(|e| (case.name.clone(), e))
        })
        .collect();

    let count = case_errors.len().max(1) as f64;
    let mean_abs_error_percent = case_errors.iter().map(|(_, e)| e.abs()).sum::<f64>() / count;
    let max_abs_error_percent = case_errors.iter().fold(0.0f64, |acc, (_, e)| acc.max(e.abs()));
    let within_5_percent = case_errors.iter().filter(|(_, e)| e.abs() <= 5.0).count();

    Ok(SweepResult {
        config: config.clone(),
        mean_abs_error_percent,
        max_abs_error_percent,
        within_5_percent,
        case_errors,
    })
}

/// Evaluate the whole grid in parallel, best first.
pub fn run_sweep(cases: &[SweepCase], space: &ParameterSpace) -> Result<Vec<SweepResult>, GainError> {
    if cases.is_empty() {
        return Err(GainError::InvalidInput(
            "parameter sweep needs at least one activity with a reference gain".to_string(),
        ));
    }

    let candidates = space.candidates();
    let start_time = std::time::Instant::now();

    let mut results = candidates
        .par_iter()
        .map(|config| evaluate_config(config, cases))
        .collect::<Result<Vec<_>, _>>()?;

    results.sort_by(|a, b| {
        a.mean_abs_error_percent
            .total_cmp(&b.mean_abs_error_percent)
            .then(a.max_abs_error_percent.total_cmp(&b.max_abs_error_percent))
    });

    info!(
        combinations = candidates.len(),
        cases = cases.len(),
        threads = rayon::current_num_threads(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "parameter sweep complete"
    );

    Ok(results)
}

fn describe_buckets(buckets: &[TerrainBucket]) -> String {
    buckets
        .iter()
        .map(|b| match b.upper_bound_m {
            Some(bound) => format!("<{:.0}:{:.2}", bound, b.threshold_m),
            None => format!("*:{:.2}", b.threshold_m),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn write_sweep_csv(results: &[SweepResult], output_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut wtr = Writer::from_path(output_path)?;

    for (i, result) in results.iter().enumerate() {
        wtr.serialize(SweepOutput {
            rank: i + 1,
            mean_abs_error_percent: result.mean_abs_error_percent,
            max_abs_error_percent: result.max_abs_error_percent,
            within_5_percent: result.within_5_percent,
            smoothing_window: result.config.smoothing_window,
            flat_threshold_m: result.config.minimum_climb_threshold,
            buckets: match result.config.minimum_climb_threshold {
                Some(_) => String::new(),
                None => describe_buckets(&result.config.terrain_buckets),
            },
        })?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn print_sweep_summary(results: &[SweepResult], top_n: usize) {
    println!("\n🔬 PARAMETER SWEEP RESULTS");
    println!("=========================");
    println!("Tested {} parameter combinations", results.len());

    for (i, result) in results.iter().take(top_n).enumerate() {
        println!("\n#{} mean error {:.1}%, max {:.1}%, within ±5%: {}/{}",
                 i + 1,
                 result.mean_abs_error_percent,
                 result.max_abs_error_percent,
                 result.within_5_percent,
                 result.case_errors.len());
        println!("   {}", result.config.describe());
    }

    if let Some(best) = results.first() {
        println!("\n🏆 Per-activity errors for the best combination:");
        for (name, error) in &best.case_errors {
            println!("  {:<40} {:+.1}%", name, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staircase_case(name: &str, steps: usize, step_height: f64, reference_m: f64) -> SweepCase {
        // Flat shelves joined by sharp rises, with a descent after each one
        let mut altitudes = Vec::new();
        let mut base = 100.0;
        for _ in 0..steps {
            altitudes.extend(std::iter::repeat(base).take(40));
            altitudes.extend(std::iter::repeat(base + step_height).take(40));
            base += step_height / 2.0;
        }
        SweepCase {
            name: name.to_string(),
            altitudes,
            reference_m,
        }
    }

    #[test]
    fn test_candidates_cover_grid() {
        let space = ParameterSpace {
            windows: vec![4, 30],
            flat_thresholds: vec![8.0, 10.0],
            flat_bucket_bounds: vec![85.0],
            bucket_scales: vec![1.0],
        };
        let candidates = space.candidates();
        assert_eq!(candidates.len(), 6);
        assert!(candidates.contains(&EstimatorConfig::final_adaptive()));
        assert!(candidates.contains(&EstimatorConfig::short_window()));
    }

    #[test]
    fn test_invalid_candidates_dropped() {
        let space = ParameterSpace {
            windows: vec![0, 10],
            flat_thresholds: vec![0.0, 5.0],
            flat_bucket_bounds: vec![120.0],
            bucket_scales: vec![1.0],
        };
        // window 0 is dropped, threshold 0 is dropped, and a flat bound of
        // 120 would sit above the 100m rolling bound
        let candidates = space.candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].minimum_climb_threshold, Some(5.0));
    }

    #[test]
    fn test_sweep_ranks_exact_threshold_first() {
        // Each 20m step rises then falls back 10m; a 5m..20m threshold sees
        // every step, so the true gain is steps * 20
        let cases = vec![
            staircase_case("steps_a", 6, 20.0, 120.0),
            staircase_case("steps_b", 4, 20.0, 80.0),
        ];
        let space = ParameterSpace {
            windows: vec![1],
            flat_thresholds: vec![5.0, 25.0],
            flat_bucket_bounds: vec![],
            bucket_scales: vec![],
        };

        let results = run_sweep(&cases, &space).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].config.minimum_climb_threshold, Some(5.0));
        assert!(results[0].mean_abs_error_percent < 1e-9);
        assert_eq!(results[0].within_5_percent, 2);
        assert!(results[1].mean_abs_error_percent > results[0].mean_abs_error_percent);
    }

    #[test]
    fn test_sweep_needs_cases() {
        assert!(matches!(
            run_sweep(&[], &ParameterSpace::default()),
            Err(GainError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_write_sweep_csv() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("reports").join("sweep.csv");
        let cases = vec![staircase_case("steps", 3, 20.0, 60.0)];
        let space = ParameterSpace {
            windows: vec![1, 4],
            flat_thresholds: vec![5.0],
            flat_bucket_bounds: vec![85.0],
            bucket_scales: vec![1.0],
        };

        let results = run_sweep(&cases, &space).unwrap();
        write_sweep_csv(&results, &output).unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        assert_eq!(content.lines().count(), results.len() + 1);
        assert!(content.contains("<85:9.00 <100:10.00 *:14.00"));
    }
}
