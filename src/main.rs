use clap::{Parser, Subcommand};
use tracing::info;

use fundamentus_scraper::config::Config;
use fundamentus_scraper::logging;
use fundamentus_scraper::pipeline::Pipeline;
use fundamentus_scraper::scheduler::{NoopScheduler, SchedulerPort};
use fundamentus_scraper::storage::{
    WarmOutcome, FILTERED_TABLE_FILE, METADATA_FILE, RAW_TABLE_FILE,
};

#[derive(Parser)]
#[command(name = "fundamentus-scraper")]
#[command(about = "Fundamentus screener: resilient scraping pipeline with tiered persistence")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one acquisition (probe, browser retrieval, screening, persistence)
    Scrape {
        /// Bypass the scraped-today freshness check
        #[arg(long)]
        force: bool,
    },
    /// Print the best available dataset and its freshness
    Show,
    /// Populate an empty cache from the durable tiers
    WarmCache,
    /// Report tier connectivity and artifact status
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    logging::init_logging();

    let config = Config::from_env()?;
    let pipeline = Pipeline::new(config.clone())?;

    match cli.command {
        Commands::Scrape { force } => {
            info!("starting acquisition run for {}", config.source_url);
            let outcome = pipeline.run_acquisition(force).await?;
            println!("{}", outcome);
        }
        Commands::Show => {
            let served = pipeline.serve().await;
            match &served.table {
                Some(table) => {
                    println!("{}", table.headers.join("  "));
                    for row in &table.rows {
                        println!("{}", row.join("  "));
                    }
                    println!();
                    match served.last_scrape() {
                        Some(ts) => println!("last scrape: {}", ts),
                        None => println!("last scrape: unknown"),
                    }
                    println!("served from: {}", served.source);
                    if served.blocked {
                        println!("note: source currently blocked, serving cached data");
                    }
                }
                None => println!("no data yet — run `fundamentus-scraper scrape` first"),
            }
        }
        Commands::WarmCache => match pipeline.warm_cache().await? {
            WarmOutcome::CacheDisabled => println!("cache tier disabled (REDIS_URL not set)"),
            WarmOutcome::AlreadyWarm => println!("cache already contains data"),
            WarmOutcome::Populated => println!("cache populated from durable tiers"),
            WarmOutcome::NothingToLoad => println!("no durable data to load yet"),
        },
        Commands::Check => {
            let storage = pipeline.storage();

            println!("source url: {}", config.source_url);

            match storage.cache_ping().await {
                Some(true) => println!("cache: connected"),
                Some(false) => println!("cache: configured but unreachable"),
                None => println!("cache: disabled (REDIS_URL not set)"),
            }

            for name in [RAW_TABLE_FILE, FILTERED_TABLE_FILE, METADATA_FILE] {
                match storage.local().file_size(name) {
                    Some(size) => println!("local {}: {} bytes", name, size),
                    None => println!("local {}: missing", name),
                }
            }
            let stale = storage.local().stale_temp_files();
            if !stale.is_empty() {
                println!("warning: {} stale temp file(s) from interrupted writes", stale.len());
            }

            if storage.remote_enabled() {
                println!("remote store: configured");
            } else {
                println!("remote store: disabled (SUPABASE_* not set)");
            }

            let scheduler = NoopScheduler;
            println!(
                "scheduler: {}",
                if scheduler.can_schedule() { "available" } else { "not available (external cron expected)" }
            );
        }
    }

    Ok(())
}
