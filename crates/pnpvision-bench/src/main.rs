//! pnpvision-bench: CLI tool for running pipeline definitions and
//! collecting per-stage diagnostics.
//!
//! Loads a JSON pipeline definition, seeds the input image and the run
//! context (camera scale, part, package footprint, configuration
//! directory), runs the pipeline and prints the per-stage outcome report.
//! Useful for:
//!
//! - Checking which stage of a vision pipeline stops producing results
//! - Tuning thresholds against saved camera frames
//! - Measuring per-stage durations across repeated runs
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin pnpvision-bench -- --definition pipeline.json [OPTIONS] [IMAGE_PATH]
//! ```
//!
//! Set `RUST_LOG=pnpvision_pipeline=debug` to trace every stage.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use pnpvision_pipeline::properties;
use pnpvision_pipeline::{
    Camera, ColorSpace, Footprint, LengthUnit, Package, Part, Pipeline, PipelineDefinition,
    RunReport, UnitsPerPixel,
};
use tracing_subscriber::EnvFilter;

/// Run a vision pipeline definition and report per-stage outcomes.
#[derive(Parser)]
#[command(name = "pnpvision-bench", version)]
struct Cli {
    /// Input image seeded as the working image (PNG, JPEG, BMP, WebP).
    ///
    /// Optional when the definition starts with an `ImageRead` stage.
    image_path: Option<PathBuf>,

    /// Pipeline definition (JSON).
    #[arg(long)]
    definition: PathBuf,

    /// Color space the input image is converted to.
    #[arg(long, value_enum, default_value_t = InputColor::Rgb)]
    color_space: InputColor,

    /// Id of the part being handled (sets the `part` property).
    #[arg(long)]
    part_id: Option<String>,

    /// Package id of the part. Defaults to the part id.
    #[arg(long, requires = "part_id")]
    package_id: Option<String>,

    /// Package body width, in `--units`.
    #[arg(long, requires = "part_id")]
    body_width: Option<f64>,

    /// Package body height, in `--units`.
    #[arg(long, requires = "part_id")]
    body_height: Option<f64>,

    /// Camera scale at the focal plane, in `--units` per pixel (sets the
    /// `camera` property).
    #[arg(long)]
    units_per_pixel: Option<f64>,

    /// Length unit of body dimensions and camera scale.
    #[arg(long, value_enum, default_value_t = Units::Millimeters)]
    units: Units,

    /// Configuration directory holding the default `templates` directory.
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Stop each run at the first failing stage.
    #[arg(long)]
    strict: bool,

    /// Output reports as JSON instead of human-readable tables.
    #[arg(long)]
    json: bool,

    /// Write the final working image of the last run to this file.
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Input color space selection.
#[derive(Clone, Copy, ValueEnum)]
enum InputColor {
    /// Single luminance channel.
    Gray,
    /// Three color channels.
    Rgb,
    /// Color with alpha.
    Rgba,
}

impl From<InputColor> for ColorSpace {
    fn from(value: InputColor) -> Self {
        match value {
            InputColor::Gray => Self::Gray,
            InputColor::Rgb => Self::Rgb,
            InputColor::Rgba => Self::Rgba,
        }
    }
}

/// Length unit selection.
#[derive(Clone, Copy, ValueEnum)]
enum Units {
    Millimeters,
    Centimeters,
    Meters,
    Inches,
    Mils,
}

impl From<Units> for LengthUnit {
    fn from(value: Units) -> Self {
        match value {
            Units::Millimeters => Self::Millimeters,
            Units::Centimeters => Self::Centimeters,
            Units::Meters => Self::Meters,
            Units::Inches => Self::Inches,
            Units::Mils => Self::Mils,
        }
    }
}

/// Parse the definition file and build the pipeline.
fn load_pipeline(path: &Path) -> Result<Pipeline, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    let definition: PipelineDefinition = serde_json::from_str(&text)
        .map_err(|e| format!("Error parsing {}: {e}", path.display()))?;
    Pipeline::from_definition(definition)
        .map_err(|e| format!("Invalid definition {}: {}", path.display(), e.chain_message()))
}

/// Seed the input image and the run context from CLI arguments.
///
/// Everything is set persistently so repeated runs see the same context.
fn seed(pipeline: &mut Pipeline, cli: &Cli) -> Result<(), String> {
    if let Some(ref image_path) = cli.image_path {
        let image = pnpvision_pipeline::vision::load_image(image_path)
            .map_err(|e| format!("Error loading {}: {}", image_path.display(), e.chain_message()))?;
        let color_space = ColorSpace::from(cli.color_space);
        eprintln!(
            "Image: {} ({}x{}, {color_space})",
            image_path.display(),
            image.width(),
            image.height(),
        );
        pipeline.set_input_image(
            pnpvision_pipeline::vision::into_color_space(image, color_space),
            color_space,
        );
    }

    let units = LengthUnit::from(cli.units);
    if let Some(ref part_id) = cli.part_id {
        let footprint = match (cli.body_width, cli.body_height) {
            (Some(body_width), Some(body_height)) => Some(Footprint {
                body_width,
                body_height,
                units,
            }),
            (None, None) => None,
            _ => return Err("--body-width and --body-height must be given together".to_string()),
        };
        let part = Part {
            id: part_id.clone(),
            package: Package {
                id: cli.package_id.clone().unwrap_or_else(|| part_id.clone()),
                footprint,
            },
        };
        eprintln!("Part: {part:?}");
        pipeline.set_persistent_property(properties::PART, part);
    }
    if let Some(scale) = cli.units_per_pixel {
        let camera = Camera {
            name: "bench".to_string(),
            units_per_pixel: UnitsPerPixel {
                x: scale,
                y: scale,
                units,
            },
        };
        pipeline.set_persistent_property(properties::CAMERA, camera);
    }
    if let Some(ref dir) = cli.config_dir {
        pipeline.set_persistent_property(properties::CONFIGURATION_DIRECTORY, dir.clone());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut pipeline = match load_pipeline(&cli.definition) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(msg) = seed(&mut pipeline, &cli) {
        eprintln!("{msg}");
        return ExitCode::FAILURE;
    }

    eprintln!(
        "Stages: {}",
        pipeline.stage_names().collect::<Vec<_>>().join(" -> ")
    );
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut timings = Vec::with_capacity(cli.runs);
    let mut failed = false;

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let report = if cli.strict {
            if let Err(e) = pipeline.run_strict() {
                eprintln!("Pipeline aborted: {}", e.chain_message());
            }
            pipeline.report()
        } else {
            pipeline.run()
        };
        failed |= !report.succeeded();

        if cli.json {
            match serde_json::to_string_pretty(report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing report: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", report.summary());
        }
        timings.push(RunTimings::from(report));

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if let Some(ref output) = cli.output {
        match pipeline.working_image() {
            Some((image, _)) => match image.save(output) {
                Ok(()) => eprintln!("Working image written to {}", output.display()),
                Err(e) => {
                    eprintln!("Error writing {}: {e}", output.display());
                    return ExitCode::FAILURE;
                }
            },
            None => eprintln!("No working image to write"),
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&timings);
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Durations of one run, in milliseconds.
struct RunTimings {
    total: f64,
    stages: Vec<(String, f64)>,
}

impl From<&RunReport> for RunTimings {
    fn from(report: &RunReport) -> Self {
        Self {
            total: report.total_duration.as_secs_f64() * 1000.0,
            stages: report
                .stages
                .iter()
                .map(|s| (s.name.clone(), s.duration.as_secs_f64() * 1000.0))
                .collect(),
        }
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(timings: &[RunTimings]) {
    println!();
    println!("Summary ({} runs)\n{}", timings.len(), "=".repeat(60));

    if timings.is_empty() {
        println!("Warning: no runs to summarize");
        return;
    }

    let totals: Vec<f64> = timings.iter().map(|t| t.total).collect();
    let min = totals.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = totals.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = totals.iter().sum::<f64>() / totals.len() as f64;
    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means, in definition order of the first run.
    let mut per_stage: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for run in timings {
        for (name, ms) in &run.stages {
            per_stage.entry(name.as_str()).or_default().push(*ms);
        }
    }

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));
    for (name, _) in &timings[0].stages {
        if let Some(durations) = per_stage.get(name.as_str()) {
            let stage_mean = durations.iter().sum::<f64>() / durations.len() as f64;
            println!("{name:<24} {stage_mean:>10.3}ms");
        }
    }
}
