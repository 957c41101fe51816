use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use wave_sort::constants::{USAGE_ARGUMENTS, VERBOSITY_NORMAL, VERBOSITY_SILENT, VERBOSITY_VERBOSE};
use wave_sort::external_sort::config::parse_optional;
use wave_sort::utils::{format_bytes, format_duration, setup_logging};
use wave_sort::{sort_file, SortError, SortParameters, SortSettings};

#[derive(Parser)]
#[command(name = "wave-sort")]
#[command(about = "Wave Sort - external merge sort for files of native-endian i32 records")]
#[command(version)]
struct Args {
    #[arg(help = "Input file of raw i32 records")]
    input: Option<PathBuf>,

    #[arg(help = "Where the sorted records are written")]
    output: Option<PathBuf>,

    #[arg(allow_hyphen_values = true, help = "Memory limit in MB (1-256, default 10)")]
    memory_limit_mb: Option<String>,

    #[arg(allow_hyphen_values = true, help = "Worker threads (1-100, default 4)")]
    threads_count: Option<String>,

    #[arg(allow_hyphen_values = true, help = "Chunks combined per merge (>= 2, default 2)")]
    ways_for_merging: Option<String>,

    #[arg(short, long, help = "JSON settings file; created with defaults if missing")]
    config: Option<PathBuf>,

    #[arg(long, help = "Directory for intermediate chunk files (default: current directory)")]
    work_dir: Option<PathBuf>,

    #[arg(short, long, help = "Verbose output")]
    verbose: bool,

    #[arg(short, long, conflicts_with = "verbose", help = "Only report errors")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let is_configuration = err
                .downcast_ref::<SortError>()
                .is_some_and(SortError::is_configuration);

            println!("{:#}", err);
            if is_configuration {
                let program = std::env::args().next().unwrap_or_else(|| "wave-sort".to_string());
                println!();
                println!("Usage: {} {}", program, USAGE_ARGUMENTS);
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = match &args.config {
        Some(path) if path.exists() => SortSettings::load(path).await?,
        Some(path) => {
            let defaults = SortSettings::defaults();
            defaults.to_file(path)?;
            println!("📄 Settings file not found, created default: {}", path.display());
            defaults
        }
        None => SortSettings::default(),
    };

    let verbosity = if args.quiet {
        VERBOSITY_SILENT
    } else if args.verbose || settings.verbose {
        VERBOSITY_VERBOSE
    } else {
        VERBOSITY_NORMAL
    };
    setup_logging(verbosity).context("failed to initialise logging")?;

    let mut params = SortParameters::from_settings(&settings);
    params.input = args.input;
    params.output = args.output;
    if let Some(mb) = parse_optional::<u64>(args.memory_limit_mb.as_deref(), "Incorrect memory limit")? {
        params.memory_limit_mb = Some(mb);
    }
    if let Some(threads) = parse_optional::<usize>(args.threads_count.as_deref(), "Incorrect threads count")? {
        params.threads = Some(threads);
    }
    if let Some(ways) = parse_optional::<usize>(
        args.ways_for_merging.as_deref(),
        "Can not use this number of ways for merging",
    )? {
        params.ways = Some(ways);
    }
    if let Some(dir) = args.work_dir {
        params.work_directory = Some(dir);
    }

    let config = params.resolve()?;
    info!("Input: {}", config.input_path.display());
    info!("Output: {}", config.output_path.display());
    info!(
        "Memory budget: {}, threads: {}, ways: {}, chunk size: {}",
        format_bytes(config.memory_budget as u64),
        config.threads,
        config.ways,
        format_bytes(config.chunk_size as u64)
    );

    let output_path = config.output_path.clone();
    let stats = sort_file(config).await?;

    if !args.quiet {
        println!("✅ Sorted {} records ({})", stats.records_sorted, format_bytes(stats.input_bytes));
        println!(
            "📦 Chunks: {} initial, {} merge tasks over {} waves",
            stats.initial_chunks, stats.merge_tasks, stats.merge_waves
        );
        println!(
            "⏱️ Split {} / sort+merge {} / total {}",
            format_duration(stats.split_time_ms),
            format_duration(stats.sort_merge_time_ms),
            format_duration(stats.total_time_ms)
        );
        println!("📝 Output written to: {}", output_path.display());
    }

    Ok(())
}
