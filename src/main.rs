mod config;
mod engine;
mod loader;
mod models;
mod notifier;
mod pipeline;
mod report;
mod storage;
mod utils;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::notifier::{ConsoleSink, DiffSink, WebhookNotifier};
use crate::pipeline::Pipeline;
use crate::storage::Repository;

#[derive(Parser)]
#[command(name = "boxprice", about = "Card box-price aggregation engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate box prices from collector CSVs and store today's snapshot
    Estimate {
        /// Path to directory containing collector CSV files (default: data/)
        #[arg(short, long, default_value = "data")]
        dir: PathBuf,
    },

    /// Build the day-over-day price_avg diff and send it to the webhook
    Report {
        /// Print the report instead of posting it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show database statistics
    Stats,

    /// List all stored card names
    Cards,

    /// Apply schema migrations without loading data
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "boxprice_engine=info,warn",
        1 => "boxprice_engine=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Estimate { dir } => {
            let _t = utils::Timer::start("Snapshot estimate");
            let stats = Pipeline::new(config).run(&dir).await?;
            info!(
                "Done: {} cards, {} rows, {} errors",
                stats.cards_processed, stats.rows_inserted, stats.errors
            );
        }

        Command::Report { dry_run } => {
            let repo = Repository::open(&config.storage.db_path)?;
            let dates = repo.snapshot_dates()?;
            if dates.len() < 2 {
                bail!("Need two snapshots to compare, found {}", dates.len());
            }
            let (today, yesterday) = (dates[0], dates[1]);
            info!("Comparing {} against {}", today, yesterday);

            let today_avgs = repo.price_avgs_for(today)?;
            let yesterday_avgs = repo.price_avgs_for(yesterday)?;
            let diffs = report::diff_snapshots(&today_avgs, &yesterday_avgs);

            match report::render_report(&diffs) {
                None => println!("No differences found in price_avg between the two snapshots."),
                Some(content) => {
                    if dry_run {
                        ConsoleSink.send_report(&content).await?;
                    } else {
                        WebhookNotifier::new(&config.notifier)?
                            .send_report(&content)
                            .await?;
                    }
                    info!("{} differences reported", diffs.len());
                }
            }
        }

        Command::Stats => {
            let repo = Repository::open(&config.storage.db_path)?;
            let rows = repo.listing_row_count()?;
            let cards = repo.card_count()?;
            let estimates = repo.estimate_count()?;
            let (min, max) = repo.date_range().unwrap_or((None, None));
            println!("─────────────────────────────────");
            println!("  Box Price Engine — DB Stats");
            println!("─────────────────────────────────");
            println!("  Cards      : {}", utils::fmt_number(cards));
            println!("  Rows       : {}", utils::fmt_number(rows));
            println!("  Estimates  : {}", utils::fmt_number(estimates));
            println!("  From       : {}", min.map(|d| d.to_string()).unwrap_or("—".into()));
            println!("  To         : {}", max.map(|d| d.to_string()).unwrap_or("—".into()));
            println!("─────────────────────────────────");
        }

        Command::Cards => {
            let repo = Repository::open(&config.storage.db_path)?;
            let cards = repo.list_cards()?;
            if cards.is_empty() {
                println!("No cards — run `boxprice estimate` first.");
            } else {
                println!("{} cards:", cards.len());
                for c in &cards {
                    println!("  {}", c);
                }
            }
        }

        Command::Migrate => {
            Repository::open(&config.storage.db_path)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}
