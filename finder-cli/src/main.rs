use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use finder::{
    ConfigOverrides, EncodingMode, FinderConfig, FinderError, ScanEngine, ScanEvent, ScanOptions,
    ScanOutcome, ScanResult,
};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const EXIT_CANCELLED: u8 = 130;
const EXIT_FAILED: u8 = 2;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Text to search for (case-insensitive)
    needle: String,

    /// Root directory to search in
    #[arg(short = 'd', long = "root")]
    root: Option<PathBuf>,

    /// File name glob, e.g. "*.vbproj"
    #[arg(short = 'n', long = "name")]
    name: Option<String>,

    /// Maximum number of files read at once
    #[arg(short = 'j', long = "parallelism")]
    parallelism: Option<NonZeroUsize>,

    /// How to treat files that are not valid UTF-8 (failfast|lossy)
    #[arg(long)]
    encoding: Option<EncodingMode>,

    /// Configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is not set (e.g. "info", "finder=debug")
    #[arg(long)]
    log_level: Option<String>,

    /// Print only the summary
    #[arg(short, long)]
    stats: bool,

    /// Print the final result as JSON
    #[arg(long, conflicts_with = "stats")]
    json: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(EXIT_FAILED)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = FinderConfig::load_from(cli.config.as_deref())
        .map_err(|e| FinderError::config_error(e.to_string()))
        .context("Failed to load configuration")?
        .merge_with_cli(ConfigOverrides {
            root_path: cli.root.clone(),
            name_pattern: cli.name.clone(),
            max_parallelism: cli.parallelism,
            encoding_mode: cli.encoding,
            log_level: cli.log_level.clone(),
        });

    init_logging(&config.log_level);
    debug!("Effective configuration: {:?}", config);

    let engine = ScanEngine::new();
    let request = config.request_for(cli.needle.as_str());
    let handle = engine
        .start_scan_with(
            request,
            ScanOptions::new().encoding_mode(config.encoding_mode),
        )
        .context("Failed to start scan")?;

    let token = handle.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        warn!("Ctrl-C will not cancel the scan: {}", e);
    }

    let stream = !cli.stats && !cli.json;
    for event in handle.events() {
        if stream {
            print_event(&event);
        }
    }

    let result = handle.wait();
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?
        );
    } else {
        print_summary(&result);
    }

    Ok(exit_code(&result.outcome))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_event(event: &ScanEvent) {
    match event {
        ScanEvent::Match { path } => println!("{}", path.display().to_string().blue()),
        ScanEvent::Error(err) => eprintln!("{} {}", "skipped:".red(), err),
    }
}

fn print_summary(result: &ScanResult) {
    let status = match &result.outcome {
        ScanOutcome::Completed => "Completed".green(),
        ScanOutcome::Cancelled => "Cancelled".yellow(),
        ScanOutcome::Faulted { reason } => format!("Failed: {reason}").red(),
    };

    println!(
        "\n{}: {} matching files, {} errors ({} of {} files read, {} skipped) in {:.2?}",
        status,
        result.matched_paths.len(),
        result.errors.len(),
        result.stats.files_read,
        result.stats.files_enumerated,
        result.stats.files_skipped,
        result.stats.duration
    );
}

fn exit_code(outcome: &ScanOutcome) -> ExitCode {
    match outcome {
        ScanOutcome::Completed => ExitCode::SUCCESS,
        ScanOutcome::Cancelled => ExitCode::from(EXIT_CANCELLED),
        ScanOutcome::Faulted { .. } => ExitCode::from(EXIT_FAILED),
    }
}
