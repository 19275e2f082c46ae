use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use listing_etl::config::Settings;
use listing_etl::etl::{LocalWarehouse, Pipeline, ScrapeOutcome, Tracker};
use listing_etl::scrapers::{
    CrawlParams, HttpClient, ListingSource, OtodomScraper, Pacer, PageFetcher, RetryPolicy,
    UserAgentPool,
};
use listing_etl::store::OfferStore;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "listing-etl", about = "Scrape otodom offers and load them into the warehouse")]
struct Args {
    /// Day to process (YYYY-MM-DD), defaults to today
    #[arg(short, long)]
    ds: Option<NaiveDate>,

    /// Stop after this many listing pages
    #[arg(long)]
    page_limit: Option<u32>,

    /// Crawl every seeded city instead of the configured ones
    #[arg(long)]
    no_city_filter: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let settings = Settings::from_env()?;
    let ds = args.ds.unwrap_or_else(|| Local::now().date_naive());

    info!("🏠 listing-etl for {}", ds);

    let user_agents = match &settings.user_agents_file {
        Some(path) => UserAgentPool::from_file(path)
            .with_context(|| format!("Failed to read user agents from {}", path.display()))?,
        None => UserAgentPool::default(),
    };
    let client = HttpClient::new(settings.request_timeout, user_agents)
        .context("Failed to create HTTP client")?;
    let fetcher = PageFetcher::new(
        Arc::new(client),
        Pacer::new(settings.delay_min, settings.delay_max),
        RetryPolicy {
            max_retries: settings.max_retries,
            backoff: settings.retry_backoff,
        },
    );

    let params = CrawlParams {
        seed_file: settings.seed_file.clone(),
        allowed_cities: if args.no_city_filter {
            None
        } else {
            settings.allowed_cities.clone()
        },
        page_limit: args.page_limit,
    };
    let sources: Vec<Box<dyn ListingSource>> = vec![Box::new(OtodomScraper::new(
        fetcher,
        OfferStore::new(&settings.snapshot_dir),
        params,
    ))];

    let warehouse = LocalWarehouse::open(&settings.warehouse_dir)
        .context("Failed to open warehouse directory")?;
    let pipeline = Pipeline::new(sources, Tracker::new(Arc::new(warehouse)));

    let report = pipeline.run(ds).await;

    for source in &report.sources {
        println!("{}:", source.source_id);
        match &source.scrape {
            Some(ScrapeOutcome::Skipped) => println!("   scrape: snapshot already on disk"),
            Some(ScrapeOutcome::Scraped { offers, failures }) => {
                println!("   scrape: {} offers, {} failed listings", offers, failures.len());
                for failure in failures {
                    println!("     - {} (page {:?}): {}", failure.url, failure.page, failure.error);
                }
            }
            None => {}
        }
        if let Some(stage) = &source.stage {
            println!("   stage: {:?}", stage);
        }
        if let Some(warehouse) = &source.warehouse {
            println!("   warehouse: {:?}", warehouse);
        }
        if let Some(error) = &source.error {
            warn!("{} did not finish: {}", source.source_id, error);
        }
    }

    anyhow::ensure!(report.is_success(), "Some sources did not finish for {}", ds);
    Ok(())
}
