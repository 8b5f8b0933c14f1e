//! Harmonic exciter fuzz and soak runner
//!
//! Usage:
//!   hx-fuzz run --preset ci --format junit --output fuzz.xml
//!   hx-fuzz soak --seconds 3600 --max-cpu-delta 0.1
//!   hx-fuzz config > engine.json
//!
//! The release profile aborts on panic, so `run` must be built without
//! `--release` for panics to be caught and reported.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use hx_dsp::EngineConfig;
use hx_fuzz::{FuzzConfig, ReportFormat, SoakOptions, run_engine_fuzz_suite, run_soak};

#[derive(Parser)]
#[command(name = "hx-fuzz", about = "Fuzz and soak testing for the harmonic exciter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Default,
    Ci,
    Exhaustive,
    Minimal,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine fuzz suite
    Run {
        #[arg(short, long, value_enum, default_value = "ci")]
        preset: Preset,

        /// JSON fuzz config; overrides the preset
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        seed: Option<u64>,

        #[arg(short, long)]
        iterations: Option<usize>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: ReportFormat,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Stream audio through the engine and check long-run stability
    Soak {
        #[arg(long, default_value_t = 60.0)]
        seconds: f64,

        #[arg(long, default_value_t = 48_000.0)]
        sample_rate: f64,

        #[arg(long, default_value_t = 512)]
        block_size: usize,

        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// Allowed growth of per-block cost, last tenth vs first tenth
        #[arg(long, default_value_t = 0.1)]
        max_cpu_delta: f64,

        /// JSON engine config
        #[arg(long)]
        engine_config: Option<PathBuf>,

        /// Print the soak report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the default engine config as JSON
    Config,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Commands::Run {
            preset,
            config,
            seed,
            iterations,
            format,
            output,
        } => run(preset, config, seed, iterations, format, output),
        Commands::Soak {
            seconds,
            sample_rate,
            block_size,
            seed,
            max_cpu_delta,
            engine_config,
            json,
        } => {
            let engine = match engine_config {
                Some(path) => EngineConfig::from_file(&path)
                    .with_context(|| format!("loading engine config {}", path.display()))?,
                None => EngineConfig::default(),
            };
            let options = SoakOptions {
                seconds,
                sample_rate,
                block_size,
                seed,
                engine,
            };
            soak(&options, max_cpu_delta, json)
        }
        Commands::Config => {
            println!("{}", EngineConfig::default().to_json()?);
            Ok(())
        }
    }
}

fn run(
    preset: Preset,
    config: Option<PathBuf>,
    seed: Option<u64>,
    iterations: Option<usize>,
    format: ReportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut fuzz_config = match config {
        Some(path) => FuzzConfig::from_file(&path)
            .with_context(|| format!("loading fuzz config {}", path.display()))?,
        None => match preset {
            Preset::Default => FuzzConfig::default(),
            Preset::Ci => FuzzConfig::ci(),
            Preset::Exhaustive => FuzzConfig::exhaustive(),
            Preset::Minimal => FuzzConfig::minimal(),
        },
    };
    if let Some(seed) = seed {
        fuzz_config = fuzz_config.with_seed(seed);
    }
    if let Some(n) = iterations {
        fuzz_config = fuzz_config.with_iterations(n);
    }
    fuzz_config.validate()?;

    log::info!(
        "Fuzzing {} iterations per target, seed {:?}",
        fuzz_config.iterations,
        fuzz_config.seed
    );
    let report = run_engine_fuzz_suite(&fuzz_config);

    match output {
        Some(path) => {
            report
                .save(&path, format)
                .with_context(|| format!("writing report {}", path.display()))?;
            log::info!("Report written to {}", path.display());
        }
        None => print!("{}", report.render(format)),
    }

    if !report.all_passed() {
        bail!(
            "{} of {} targets failed",
            report.summary.failed_targets,
            report.summary.total_targets
        );
    }
    Ok(())
}

fn soak(options: &SoakOptions, max_cpu_delta: f64, json: bool) -> Result<()> {
    let report = run_soak(options)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
    }
    report.check(max_cpu_delta)?;
    Ok(())
}
