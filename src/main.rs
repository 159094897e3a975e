use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

mod auth;
mod client;
mod config;
mod convert;
mod extract;
mod load;
mod logging;
mod merge;
mod pager;
mod reshape;
mod table;
#[cfg(test)]
mod testing;
mod types;

use client::ApiClient;
use config::{ApiCredentials, Config, DEFAULT_DATA_DIR, DEFAULT_PAGE_SIZE};

#[derive(Parser)]
#[command(name = "practice-sync")]
#[command(about = "Extract paginated API data to CSV and load it into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory for page files and merged CSVs
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Records requested per page
    #[arg(long, global = true, default_value_t = DEFAULT_PAGE_SIZE,
          value_parser = clap::value_parser!(u64).range(1..))]
    page_size: u64,

    /// HTTP request timeout in seconds
    #[arg(long, global = true, default_value_t = 60)]
    timeout_secs: u64,

    /// Extra attempts for a failed page-count request
    #[arg(long, global = true, default_value_t = 2)]
    search_retries: u32,

    /// Only process the named endpoint (repeatable, e.g. --endpoint Staff)
    #[arg(long = "endpoint", global = true, value_name = "LABEL")]
    endpoints: Vec<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Extract, merge and load (the default)
    Run,
    /// Authenticate and fetch every page of every endpoint into CSV files
    Extract,
    /// Merge page files per endpoint and pivot profile endpoints
    Merge,
    /// Load merged CSV files into the database at DATABASE_URL
    Load,
    /// List configured endpoints
    Endpoints,
    /// Remove the data directory
    Clean,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let mut config = Config {
            data_dir: self.data_dir.clone(),
            page_size: self.page_size,
            timeout: Duration::from_secs(self.timeout_secs),
            search_retries: self.search_retries,
            ..Config::default()
        };
        config.select_endpoints(&self.endpoints)?;
        Ok(config)
    }
}

fn run_extract(config: &Config) -> Result<()> {
    let creds = ApiCredentials::from_env()?;
    let http = ApiClient::http_client(config.timeout)?;
    let token = auth::fetch_access_token(&http, &creds).context("Authentication failed")?;
    let client = ApiClient::new(http, &creds.api_base, token);

    for summary in extract::run_extract(&client, config)? {
        match &summary.failure {
            None => info!(
                "{}: {}/{} pages, {} records",
                summary.label, summary.pages_written, summary.total_pages, summary.records
            ),
            Some(reason) => warn!(
                "{}: incomplete after {}/{} pages: {}",
                summary.label, summary.pages_written, summary.total_pages, reason
            ),
        }
    }
    Ok(())
}

fn run_merge(config: &Config) -> Result<()> {
    let merged = merge::run_merge(config)?;
    info!("Merged {} endpoints", merged.len());
    Ok(())
}

fn run_load(config: &Config) -> Result<()> {
    let db_path = config::database_path_from_env()?;
    load::run_load(config, &db_path)?;
    Ok(())
}

fn run_endpoints(config: &Config) {
    let api_base = std::env::var("API_BASE").unwrap_or_else(|_| "$API_BASE/".to_string());
    for endpoint in &config.endpoints {
        let mut notes = Vec::new();
        if let Some(key) = endpoint.records_key {
            notes.push(format!("records under response.{}", key));
        }
        if let Some(attributes) = endpoint.profile_attributes {
            notes.push(format!("pivot [{}]", attributes.join(", ")));
        }
        println!(
            "{:<20} {}{}",
            endpoint.label,
            endpoint.url(&api_base),
            if notes.is_empty() {
                String::new()
            } else {
                format!("  ({})", notes.join("; "))
            }
        );
    }
}

fn run_clean(config: &Config) -> Result<()> {
    if config.data_dir.exists() {
        fs::remove_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to remove {}", config.data_dir.display()))?;
        println!("Removed {}/", config.data_dir.display());
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.config()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            // Check the database setting before spending time on extraction
            config::database_path_from_env()?;
            run_extract(&config)?;
            run_merge(&config)?;
            run_load(&config)
        }
        Commands::Extract => run_extract(&config),
        Commands::Merge => run_merge(&config),
        Commands::Load => run_load(&config),
        Commands::Endpoints => {
            run_endpoints(&config);
            Ok(())
        }
        Commands::Clean => run_clean(&config),
    }
}

fn main() -> ExitCode {
    // A missing .env file is fine; the environment may already be set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
