//! Prodex CLI: scrape retailer listings into a curated product catalog

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use prodex::{
    config::{Config, LogFormat, LoggingConfig},
    pipeline::{CurationEngine, QualityScorer},
    scraping::fetcher::FetchEngine,
    store::MemoryStore,
    types::BatchResult,
    util::truncate_str,
    Pipeline,
};

#[derive(Parser)]
#[command(name = "prodex")]
#[command(about = "Product catalog extraction, deduplication, and curation pipeline")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "prodex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a list of product URLs
    Scrape {
        /// Retailer name (amazon, walmart)
        #[arg(short, long)]
        retailer: String,

        /// Product page URLs
        urls: Vec<String>,

        /// Print full records as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Scrape a retailer's search results for a category or search URL
    Search {
        /// Retailer name (amazon, walmart)
        #[arg(short, long)]
        retailer: String,

        /// Category name (electronics, home, fashion, books, sports)
        /// or a full search URL
        category: String,

        /// Result pages to walk
        #[arg(short, long, default_value = "3")]
        pages: u32,
    },

    /// Scrape seed URLs, then watch them for price changes until
    /// interrupted
    Monitor {
        /// Retailer name (amazon, walmart)
        #[arg(short, long)]
        retailer: String,

        /// Product page URLs to seed the catalog with
        urls: Vec<String>,
    },
}

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directive()));
    match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    init_tracing(&config.logging);

    let fetcher = Arc::new(FetchEngine::new(&config.scraping)?);
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(config, fetcher, store)?;

    match cli.command {
        Commands::Scrape {
            retailer,
            urls,
            json,
        } => {
            let result = pipeline.run_extraction_batch(&urls, &retailer).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result.products)?);
            } else {
                report(&pipeline, result);
            }
        }

        Commands::Search {
            retailer,
            category,
            pages,
        } => {
            let result = pipeline.run_search_scrape(&retailer, &category, pages).await?;
            report(&pipeline, result);
        }

        Commands::Monitor { retailer, urls } => {
            if !urls.is_empty() {
                let result = pipeline.run_extraction_batch(&urls, &retailer).await?;
                info!(
                    products = result.success_count(),
                    failures = result.failure_count(),
                    "catalog seeded"
                );
            }

            let monitor = pipeline.price_monitor();
            let mut events = monitor.subscribe();
            let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

            let printer = tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    println!(
                        "{}: {:.2} -> {:.2} ({:+.2}%)",
                        event.product_id, event.old_price, event.new_price, event.change_percentage
                    );
                }
            });
            let runner = tokio::spawn(async move { monitor.run(shutdown_rx).await });

            tokio::signal::ctrl_c().await?;
            info!("interrupt received, shutting down");
            let _ = shutdown_tx.send(());
            let _ = runner.await;
            printer.abort();
        }
    }

    Ok(())
}

/// Deduplicate, curate with the stock rules, and print a batch summary
fn report(pipeline: &Pipeline, result: BatchResult) {
    let outcome = pipeline.run_deduplication(result.products);
    if !outcome.groups.is_empty() {
        println!(
            "merged {} duplicate group(s)",
            outcome.groups.len()
        );
    }

    let mut records = outcome.merged;
    let curated = pipeline.run_curation(&mut records, CurationEngine::default_rules());

    println!("{} record(s), {} curated:", records.len(), curated.len());
    for record in &records {
        let price = record
            .current_price
            .map(|p| format!("${p:.2}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  [{}] {:>9}  {}  {}",
            QualityScorer::grade(record.data_quality_score),
            price,
            if record.is_curated { "curated" } else { "       " },
            truncate_str(&record.title, 60)
        );
    }

    if !result.failures.is_empty() {
        println!("{} failure(s):", result.failures.len());
        for failure in &result.failures {
            println!("  {:?}: {} ({})", failure.kind, failure.url, failure.reason);
        }
    }
}
