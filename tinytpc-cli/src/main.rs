//! `tinytpc`: pedestal building and track reconstruction for TinyTPC packet tables.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{ArgAction, Parser, Subcommand};
use log::{error, info, LevelFilter};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tinytpc_algorithms::{Reconstructor, RunReconstruction, WindowScanner};
use tinytpc_anode::{
    AddressMapper, AnodeLayout, ChannelMask, ChargeCalibration, HitTableBuilder, PedestalMap,
    RawPacket,
};
use tinytpc_core::{PacketType, ReconstructionConfig, PIXEL_COUNT};
use tinytpc_io::{read_packet_table, read_pedestal_table, save_pedestal_table, ResultWriter};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    TinytpcIo(#[from] tinytpc_io::Error),

    #[error("{0}")]
    Core(#[from] tinytpc_core::Error),

    #[error("charge calibration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("all {0} runs failed")]
    AllRunsFailed(usize),
}

/// Pedestal building and track reconstruction for the TinyTPC pixel anode.
#[derive(Parser, Debug)]
#[command(name = "tinytpc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Anode layout JSON (chip grid and channel routing)
    #[arg(long, global = true)]
    layout: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a pedestal table from a zero-signal packet table
    Pedestal {
        /// Pedestal run packet table (CSV)
        input: PathBuf,

        /// Output pedestal table
        #[arg(short, long)]
        output: PathBuf,

        /// Also write per-pixel pedestal statistics (CSV)
        #[arg(long)]
        stats: Option<PathBuf>,

        /// Tick length in microseconds, for trigger rates
        #[arg(long, default_value = "0.1")]
        tick_us: f64,
    },

    /// Reconstruct tracks in one or more runs
    Reconstruct {
        /// Run packet tables (CSV), one per run
        #[arg(required = true)]
        runs: Vec<PathBuf>,

        /// Pedestal table
        #[arg(long)]
        pedestal: PathBuf,

        /// Reconstruction configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Front-end chip configuration files with channel masks
        #[arg(long)]
        mask: Vec<PathBuf>,

        /// ADC to charge calibration (JSON); adds a dQ/dx column
        #[arg(long)]
        charge: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show packet and hit statistics of a packet table
    Info {
        /// Packet table (CSV)
        input: PathBuf,

        /// Pedestal table; amplitudes are reported when given
        #[arg(long)]
        pedestal: Option<PathBuf>,

        /// Reconstruction configuration (JSON), for the candidate count
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn load_mapper(layout: Option<&Path>) -> Result<AddressMapper> {
    match layout {
        Some(path) => Ok(AddressMapper::new(AnodeLayout::from_file(path)?)?),
        None => Ok(AddressMapper::canonical()),
    }
}

fn load_config(path: Option<&Path>) -> Result<ReconstructionConfig> {
    match path {
        Some(path) => Ok(ReconstructionConfig::from_file(path)?),
        None => Ok(ReconstructionConfig::default()),
    }
}

fn run_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "run".to_string(), |s| s.to_string_lossy().into_owned())
}

/// Outcome counts of a batch of runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BatchSummary {
    processed: usize,
    failed: usize,
    fitted: usize,
}

/// Reconstruct every run file and write its CSVs into `output`.
///
/// A run that cannot be read, reconstructed or written is logged and
/// counted as failed; the remaining runs still go through.
fn reconstruct_batch(
    runs: &[PathBuf],
    reconstructor: &Reconstructor<'_>,
    output: &Path,
    calibration: Option<&ChargeCalibration>,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    let loaded: Vec<_> = runs.par_iter().map(read_packet_table).collect();

    let mut paths = Vec::with_capacity(runs.len());
    let mut packets: Vec<Vec<RawPacket>> = Vec::with_capacity(runs.len());
    for (path, result) in runs.iter().zip(loaded) {
        match result {
            Ok(run) => {
                paths.push(path);
                packets.push(run);
            }
            Err(e) => {
                error!("{}: {e}", path.display());
                summary.failed += 1;
            }
        }
    }

    let results = reconstructor.reconstruct_runs(&packets);
    for (path, result) in paths.into_iter().zip(results) {
        let run = match result {
            Ok(run) => run,
            Err(e) => {
                error!("{}: {e}", path.display());
                summary.failed += 1;
                continue;
            }
        };
        if let Err(e) = write_run_outputs(&run, path, output, calibration) {
            error!("{}: writing results failed: {e}", path.display());
            summary.failed += 1;
            continue;
        }
        let fitted = run.fitted().count();
        info!(
            "{}: {} candidates ({} dropped by the cap), {} fitted",
            path.display(),
            run.candidates.len(),
            run.candidates_dropped,
            fitted
        );
        summary.processed += 1;
        summary.fitted += fitted;
    }
    summary
}

fn write_run_outputs(
    run: &RunReconstruction,
    path: &Path,
    output: &Path,
    calibration: Option<&ChargeCalibration>,
) -> tinytpc_io::Result<()> {
    let stem = run_stem(path);
    ResultWriter::create(output.join(format!("{stem}_candidates.csv")))?
        .write_candidates_csv(run)?;
    ResultWriter::create(output.join(format!("{stem}_dedx.csv")))?
        .write_dedx_csv(run, calibration)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(level_for(cli.verbose))
        .parse_default_env()
        .init();

    let mapper = load_mapper(cli.layout.as_deref())?;

    match cli.command {
        Commands::Pedestal {
            input,
            output,
            stats,
            tick_us,
        } => {
            let packets = read_packet_table(&input)?;
            let pedestal = PedestalMap::from_packets(&packets, &mapper);
            save_pedestal_table(&output, &pedestal)?;
            if let Some(stats_path) = stats {
                ResultWriter::create(&stats_path)?
                    .write_pedestal_stats_csv(&pedestal, &mapper, tick_us)?;
                info!("Wrote pedestal statistics to {}", stats_path.display());
            }

            println!("Packets: {}", packets.len());
            println!(
                "Calibrated pixels: {}",
                PIXEL_COUNT - pedestal.uncalibrated_pixels().len()
            );
            if let Some(ticks) = pedestal.live_time_ticks() {
                println!("Live time: {:.6} s", ticks as f64 * tick_us * 1e-6);
            }
            println!("Pedestal table: {}", output.display());
        }

        Commands::Reconstruct {
            runs,
            pedestal,
            config,
            mask,
            charge,
            output,
        } => {
            let start = Instant::now();
            let pedestal = read_pedestal_table(&pedestal)?;
            let config = load_config(config.as_deref())?;
            let calibration: Option<ChargeCalibration> = match charge {
                Some(path) => Some(serde_json::from_str(&std::fs::read_to_string(path)?)?),
                None => None,
            };
            let mask = ChannelMask::from_files(&mask)?;
            std::fs::create_dir_all(&output)?;

            let mut reconstructor = Reconstructor::new(&mapper, &pedestal, config)?;
            if !mask.is_empty() {
                info!("{} channels masked", mask.masked_count());
                reconstructor = reconstructor.with_mask(&mask);
            }
            let summary = reconstruct_batch(&runs, &reconstructor, &output, calibration.as_ref());

            println!(
                "Processed {} runs in {:.2}s",
                summary.processed,
                start.elapsed().as_secs_f64()
            );
            println!("Fitted candidates: {}", summary.fitted);
            if summary.failed > 0 {
                println!("Failed runs: {}", summary.failed);
            }
            if summary.failed == runs.len() {
                return Err(CliError::AllRunsFailed(summary.failed));
            }
        }

        Commands::Info {
            input,
            pedestal,
            config,
        } => {
            let packets = read_packet_table(&input)?;
            println!("File: {}", input.display());
            println!("Packets: {}", packets.len());

            let data = packets
                .iter()
                .filter(|p| p.packet_type == PacketType::Data)
                .count();
            let bad_parity = packets.iter().filter(|p| !p.parity_valid).count();
            println!("Data packets: {}", data);
            println!("Parity failures: {}", bad_parity);

            let pedestal = match pedestal {
                Some(path) => Some(read_pedestal_table(path)?),
                None => None,
            };
            let fallback;
            let baselines = if let Some(p) = &pedestal {
                p
            } else {
                fallback = PedestalMap::from_packets(&packets, &mapper);
                &fallback
            };
            let table = HitTableBuilder::new(&mapper, baselines).build(&packets);
            let stats = table.stats;
            println!("Hits: {}", stats.hits_kept);
            println!("Invalid packets: {}", stats.invalid_discarded);
            println!("Unknown addresses: {}", stats.unknown_address_dropped);

            if let Some((first, last)) = table.time_span() {
                println!(
                    "Timestamp range: {} - {}",
                    table.origin_tick,
                    table.origin_tick + (last - first)
                );
            }
            if pedestal.is_some() {
                println!("Hits on uncalibrated pixels: {}", stats.uncalibrated_hits);
                let amplitudes = table.hits.iter().map(|h| h.amplitude);
                let min = amplitudes.clone().fold(f64::INFINITY, f64::min);
                let max = amplitudes.fold(f64::NEG_INFINITY, f64::max);
                if min <= max {
                    println!("Amplitude range: {:.1} - {:.1}", min, max);
                }
            }

            let config = load_config(config.as_deref())?;
            let scanner = WindowScanner::from_config(&config)?;
            println!(
                "Candidate windows ({} bins): {}",
                scanner.bin_count(),
                scanner.scan(&table.hits).len()
            );
        }
    }

    Ok(())
}
