use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

mod config;
mod error;
mod extract;
mod fetch;
mod harvest;
mod materialize;
mod normalize;
mod repair;
mod store;
mod types;
mod utils;
mod validate;

use config::Config;
use extract::ExtractOptions;
use fetch::HttpTransport;
use materialize::GenerateOptions;
use repair::RepairOptions;

#[derive(Parser)]
#[command(name = "wad-catalog")]
#[command(about = "Cacowards WAD catalog scraper and entry maintenance")]
struct Cli {
    /// CONL config file (defaults to ./wad-catalog.conl when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the yearly Cacowards index pages into a candidate listing
    Harvest {
        #[arg(long)]
        start_year: Option<i32>,
        #[arg(long)]
        end_year: Option<i32>,
    },
    /// Fetch wiki detail pages and idGames search results for each candidate
    Extract {
        /// Only process winners, not runners-up
        #[arg(long)]
        winners_only: bool,
        /// Only process one award year
        #[arg(long)]
        year: Option<i32>,
        /// Process at most N WADs
        #[arg(long)]
        limit: Option<usize>,
        /// Quiet mode - suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Write one entry JSON file per metadata record
    Generate {
        #[arg(long)]
        limit: Option<usize>,
        /// Show what would be written without touching the entries directory
        #[arg(long)]
        dry_run: bool,
        /// Replace entries that already exist
        #[arg(long)]
        overwrite: bool,
    },
    /// Replace idGames info-page links with verified mirror downloads
    Repair {
        #[arg(long)]
        dry_run: bool,
        /// Use the first mirror without HEAD checks
        #[arg(long)]
        no_verify: bool,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(short, long)]
        quiet: bool,
    },
    /// Check every entry file against the catalog schema
    Validate {
        /// Also write all violations to a CSV file
        #[arg(long, value_name = "CSV")]
        report: Option<PathBuf>,
    },
    /// Harvest, extract, generate, repair and validate in one go
    Run {
        #[arg(long)]
        overwrite: bool,
        #[arg(long)]
        no_verify: bool,
    },
    /// Remove caches and intermediate documents (entries are kept)
    Clean,
}

fn run_clean(config: &Config) -> Result<()> {
    println!("Cleaning generated files...");

    let generated = [
        config.listing_path(),
        config.listing_cache_path(),
        config.metadata_path(),
        config.metadata_cache_path(),
    ];
    for path in &generated {
        if path.exists() {
            fs::remove_file(path)?;
            println!("  Removed {}", path.display());
        }
    }

    println!("Clean complete!");
    Ok(())
}

fn run_pipeline(config: &Config, overwrite: bool, verify: bool) -> Result<bool> {
    let transport = HttpTransport::new(&config.user_agent)?;

    harvest::run_harvest(&transport, config, config.start_year..=config.end_year)?;
    println!();
    extract::run_extract(&transport, config, &ExtractOptions::default())?;
    println!();
    materialize::run_generate(
        config,
        &GenerateOptions {
            overwrite,
            ..Default::default()
        },
    )?;
    println!();
    repair::run_repair(
        &transport,
        config,
        &RepairOptions {
            verify,
            ..Default::default()
        },
    )?;
    println!();
    Ok(validate::run_validate(config, None)?.is_ok())
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let ok = match cli.command {
        Commands::Harvest {
            start_year,
            end_year,
        } => {
            let start = start_year.unwrap_or(config.start_year);
            let end = end_year.unwrap_or(config.end_year);
            if start > end {
                bail!("--start-year {} is after --end-year {}", start, end);
            }
            let transport = HttpTransport::new(&config.user_agent)?;
            harvest::run_harvest(&transport, &config, start..=end)?;
            true
        }
        Commands::Extract {
            winners_only,
            year,
            limit,
            quiet,
        } => {
            let transport = HttpTransport::new(&config.user_agent)?;
            let opts = ExtractOptions {
                winners_only,
                year,
                limit,
                quiet,
            };
            extract::run_extract(&transport, &config, &opts)?;
            true
        }
        Commands::Generate {
            limit,
            dry_run,
            overwrite,
        } => {
            let opts = GenerateOptions {
                limit,
                dry_run,
                overwrite,
            };
            materialize::run_generate(&config, &opts)?.errors == 0
        }
        Commands::Repair {
            dry_run,
            no_verify,
            limit,
            quiet,
        } => {
            let transport = HttpTransport::new(&config.user_agent)?;
            let opts = RepairOptions {
                dry_run,
                verify: !no_verify,
                limit,
                quiet,
            };
            repair::run_repair(&transport, &config, &opts)?;
            true
        }
        Commands::Validate { report } => {
            validate::run_validate(&config, report.as_deref())?.is_ok()
        }
        Commands::Run {
            overwrite,
            no_verify,
        } => run_pipeline(&config, overwrite, !no_verify)?,
        Commands::Clean => {
            run_clean(&config)?;
            true
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
