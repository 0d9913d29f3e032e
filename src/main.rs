use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use climb_gain::batch_processor::{self, BatchOptions};
use climb_gain::parameter_sweep::{self, ParameterSpace};
use climb_gain::reference_data::ReferenceData;
use climb_gain::track_reader::read_track;
use climb_gain::{EstimatorConfig, GainError, GainUnit};

#[derive(Parser)]
#[command(
    name = "climb-gain",
    about = "Estimate elevation gain from noisy GPS altitude traces",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML estimator config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Named preset: final, legacy, short, wide
    #[arg(long, global = true, conflicts_with = "config")]
    preset: Option<String>,

    /// Override the smoothing window (samples)
    #[arg(long, global = true)]
    window: Option<usize>,

    /// Use a flat climb threshold in meters instead of the terrain table
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate the gain of a single GPX, TCX or CSV file
    Estimate {
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = UnitArg::Ft)]
        unit: UnitArg,

        /// List the counted climbs
        #[arg(long)]
        segments: bool,
    },
    /// Estimate every activity in a folder and export a CSV
    Batch {
        folder: PathBuf,

        /// Reference gains CSV (activity,reference_gain,unit,source)
        #[arg(long)]
        reference: Option<PathBuf>,

        #[arg(long, default_value = "elevation_gain_results.csv")]
        output: PathBuf,

        /// Report the reference gain instead of the estimate when one exists
        #[arg(long)]
        prefer_reference: bool,
    },
    /// Grid-search windows and thresholds against reference gains
    Sweep {
        folder: PathBuf,

        #[arg(long)]
        reference: PathBuf,

        #[arg(long, default_value = "parameter_sweep.csv")]
        output: PathBuf,

        /// How many of the best combinations to print
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Write it to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    M,
    Ft,
}

impl From<UnitArg> for GainUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::M => GainUnit::Meters,
            UnitArg::Ft => GainUnit::Feet,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = resolve_config(&cli)?;
    tracing::debug!(config = %config.describe(), "resolved estimator config");

    match cli.command {
        Command::Estimate { file, unit, segments } => run_estimate(&file, &config, unit.into(), segments),
        Command::Batch {
            folder,
            reference,
            output,
            prefer_reference,
        } => run_batch(&folder, reference.as_deref(), &output, prefer_reference, &config),
        Command::Sweep {
            folder,
            reference,
            output,
            top,
        } => run_sweep(&folder, &reference, &output, top),
        Command::Config { output } => {
            match output {
                Some(path) => {
                    config.save(&path)?;
                    println!("📁 Config saved to: {}", path.display());
                }
                None => print!("{}", config.to_toml_string()?),
            }
            Ok(())
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<EstimatorConfig, GainError> {
    let mut config = match (&cli.config, &cli.preset) {
        (Some(path), _) => EstimatorConfig::load(path)?,
        (None, Some(name)) => EstimatorConfig::preset(name)
            .ok_or_else(|| GainError::InvalidConfiguration(format!("unknown preset '{}'", name)))?,
        (None, None) => EstimatorConfig::default(),
    };

    if let Some(window) = cli.window {
        config.smoothing_window = window;
    }
    if let Some(threshold) = cli.threshold {
        config.minimum_climb_threshold = Some(threshold);
    }

    config.validate()?;
    Ok(config)
}

fn run_estimate(
    file: &Path,
    config: &EstimatorConfig,
    unit: GainUnit,
    show_segments: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let estimator = config.build()?;
    let track = read_track(file)?;
    let trace = track.trace()?;
    let estimate = estimator.estimate(&trace);

    println!("\n🏔️  {}", track.name);
    println!("================================");
    println!("Samples:         {}", estimate.sample_count);
    if let Some(km) = track.distance_km() {
        println!("Distance:        {:.2} km", km);
    }
    println!("Altitude range:  {:.1} m", estimate.altitude_range_m);
    match &estimate.terrain {
        Some(terrain) => println!("Terrain:         {} → threshold {:.1} m", terrain.label, estimate.threshold_m),
        None => println!("Threshold:       {:.1} m (flat)", estimate.threshold_m),
    }
    println!("Climbs counted:  {}", estimate.climb_count());
    println!("Elevation gain:  {:.1} {}", estimate.gain(unit), unit.suffix());

    if show_segments {
        println!("\n{:>8} {:>8} {:>10} {:>10} {:>10}", "Start", "Peak", "From m", "To m", "Gain");
        for segment in &estimate.segments {
            println!("{:>8} {:>8} {:>10.1} {:>10.1} {:>10.1}",
                     segment.start_index,
                     segment.peak_index,
                     segment.start_altitude_m,
                     segment.peak_altitude_m,
                     unit.convert(segment.gain_m()));
        }
    }

    Ok(())
}

fn run_batch(
    folder: &Path,
    reference: Option<&Path>,
    output: &Path,
    prefer_reference: bool,
    config: &EstimatorConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n🔄 Estimating elevation gain for activities in {}", folder.display());
    println!("   {}", config.describe());

    let estimator = config.build()?;
    let references = match reference {
        Some(path) => ReferenceData::load(path)?,
        None => ReferenceData::default(),
    };

    let results = batch_processor::process_folder(
        folder,
        &estimator,
        &references,
        BatchOptions { prefer_reference },
    )?;

    if results.is_empty() {
        println!("⚠️  No GPX, TCX or CSV files found");
        return Ok(());
    }

    batch_processor::write_results_csv(&results, output)?;
    batch_processor::print_batch_summary(&results);
    println!("\n📁 Results saved to: {}", output.display());

    Ok(())
}

fn run_sweep(folder: &Path, reference: &Path, output: &Path, top: usize) -> Result<(), Box<dyn std::error::Error>> {
    let references = ReferenceData::load(reference)?;
    let cases = parameter_sweep::load_cases(folder, &references)?;

    println!("\n🚀 Parameter sweep over {} activities with reference gains", cases.len());

    let results = parameter_sweep::run_sweep(&cases, &ParameterSpace::default())?;
    parameter_sweep::write_sweep_csv(&results, output)?;
    parameter_sweep::print_sweep_summary(&results, top);
    println!("\n📁 Results saved to: {}", output.display());

    Ok(())
}
