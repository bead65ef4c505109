//! Job Scraper CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use job_scraper::{
    error::Result,
    models::{Config, SinkKind},
    pipeline,
    storage::{JsonFileSink, MirroredSink, RecordSink, SupabaseSink},
};

/// Job posting scraper for a dynamically rendered job board
#[derive(Parser, Debug)]
#[command(
    name = "job-scraper",
    version,
    about = "Scrapes job postings and upserts them into a record sink"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape result pages and store the records
    Run {
        /// Write records to a local JSON file instead of the configured sink
        #[arg(long)]
        dry_run: bool,

        /// JSON output file (default: sink.output); with a remote sink the
        /// file is written as well
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract records from a saved HTML page and print them as JSON
    Extract {
        /// Saved page
        file: PathBuf,

        /// URL the page was saved from (default: site.search_url)
        #[arg(long)]
        url: Option<String>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Build the sink selected by the configuration and flags.
fn build_sink(config: &Config, dry_run: bool, output: Option<PathBuf>) -> Result<Box<dyn RecordSink>> {
    if dry_run || config.sink.kind == SinkKind::Json {
        let path = output.unwrap_or_else(|| config.sink.output.clone());
        log::info!("Records will be written to {}", path.display());
        return Ok(Box::new(JsonFileSink::new(path)));
    }

    let remote = SupabaseSink::from_env(&config.sink)?;
    let sink: Box<dyn RecordSink> = match output {
        Some(path) => Box::new(MirroredSink::new(JsonFileSink::new(path), remote)),
        None => Box::new(remote),
    };
    Ok(sink)
}

async fn execute(cli: Cli, config: Config) -> Result<ExitCode> {
    let config = Arc::new(config);

    match cli.command {
        Command::Run { dry_run, output } => {
            config.validate()?;
            let sink = build_sink(&config, dry_run, output)?;

            let summary = pipeline::run_scraper(Arc::clone(&config), &*sink).await?;

            if summary.stats.pages_visited == 0 {
                log::error!("No result page could be fetched");
                return Ok(ExitCode::FAILURE);
            }
            if !summary.is_success() {
                return Ok(ExitCode::FAILURE);
            }
            log::info!("Scrape complete!");
        }

        Command::Extract { file, url } => {
            let html = std::fs::read_to_string(&file)?;
            let url = url.unwrap_or_else(|| config.site.search_url.clone());

            let records = pipeline::extract_records(&config, &html, &url)?;
            log::info!("Extracted {} records from {}", records.len(), file.display());
            println!("{}", serde_json::to_string_pretty(&records)?);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({})", cli.config.display());

            if config.sink.kind == SinkKind::Supabase {
                match SupabaseSink::from_env(&config.sink) {
                    Ok(_) => log::info!("✓ Supabase credentials present"),
                    Err(e) => log::warn!("{}", e),
                }
            }

            log::info!("All validations passed!");
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    // The level is read before the logger exists; load failures are
    // reported by the second load once it does.
    let level = Config::load(&cli.config)
        .map_or_else(|_| "info".to_string(), |c| c.logging.level);
    init_logging(cli.verbose, &level);

    let config = Config::load_or_default(&cli.config);
    log::info!("Loaded configuration from {}", cli.config.display());

    match execute(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
