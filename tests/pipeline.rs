use async_trait::async_trait;
use chrono::NaiveDate;
use listing_etl::error::FetchError;
use listing_etl::etl::{
    LocalWarehouse, Pipeline, ScrapeOutcome, StageOutcome, Tracker, WarehouseOutcome,
};
use listing_etl::scrapers::discovery::ListingDiscoverer;
use listing_etl::scrapers::{
    CrawlParams, ListingSource, OtodomScraper, Pacer, PageFetcher, PageSource, RetryPolicy,
};
use listing_etl::store::OfferStore;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const LISTING: &str = "https://www.otodom.pl/wynajem/mieszkanie/gdansk/";

/// Serves fixed bodies per page index and counts requests
struct StaticSite {
    pages: HashMap<u32, String>,
    requests: AtomicUsize,
}

#[async_trait]
impl PageSource for StaticSite {
    async fn get(&self, url: &str, query: &[(&'static str, String)]) -> Result<String, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let page = query
            .iter()
            .find(|(name, _)| *name == "page")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(1);
        self.pages.get(&page).cloned().ok_or(FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

fn card(id: &str, price: &str) -> String {
    format!(
        r#"<article id="offer-item-ad_id{id}">
             <a href="https://www.otodom.pl/oferta/{id}"><span class="offer-item-title">Mieszkanie {id}</span></a>
             <p>Mieszkanie na wynajem: Gdańsk, Przymorze</p>
             <ul class="params"><li>2 pokoje</li><li>{price}</li><li>45 m²</li></ul>
             <div class="offer-item-details-bottom"><ul><li>Biuro</li></ul></div>
           </article>"#
    )
}

fn site() -> Arc<StaticSite> {
    let marker = r#"<script>{"page_count":"2"}</script>"#;
    let mut pages = HashMap::new();
    // Offer "promo" is promoted and shows up on both pages
    pages.insert(
        1,
        format!("<html>{marker}{}{}</html>", card("promo", "2 800 zł"), card("a", "2 100 zł")),
    );
    pages.insert(
        2,
        format!(
            "<html>{marker}{}{}{}</html>",
            card("promo", "2 800 zł"),
            card("b", "Zapytaj o cenę"),
            card("c", "1 950,50 zł")
        ),
    );
    Arc::new(StaticSite {
        pages,
        requests: AtomicUsize::new(0),
    })
}

fn pipeline(site: Arc<StaticSite>, dir: &Path, warehouse: Arc<LocalWarehouse>) -> Pipeline {
    let seed_file = dir.join("seeds.txt");
    std::fs::write(&seed_file, format!("{LISTING}\n")).unwrap();

    let fetcher = PageFetcher::new(
        site,
        Pacer::disabled(),
        RetryPolicy {
            max_retries: 1,
            backoff: Duration::ZERO,
        },
    );
    let scraper = OtodomScraper::new(
        fetcher,
        OfferStore::new(dir.join("offers")),
        CrawlParams {
            seed_file,
            allowed_cities: None,
            page_limit: None,
        },
    )
    .with_discoverer(ListingDiscoverer::new(None).with_subregion_cities(HashSet::new()));

    let sources: Vec<Box<dyn ListingSource>> = vec![Box::new(scraper)];
    Pipeline::new(sources, Tracker::new(warehouse))
}

fn ds() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 4, 2).unwrap()
}

#[tokio::test]
async fn test_full_run_scrapes_stages_and_warehouses() {
    let dir = tempfile::tempdir().unwrap();
    let site = site();
    let warehouse = Arc::new(LocalWarehouse::in_memory());

    let report = pipeline(site.clone(), dir.path(), warehouse.clone())
        .run(ds())
        .await;

    assert!(report.is_success());
    let source = &report.sources[0];
    assert_eq!(
        source.scrape,
        Some(ScrapeOutcome::Scraped {
            offers: 3,
            failures: vec![]
        })
    );
    assert_eq!(source.stage, Some(StageOutcome::Staged { rows: 3 }));
    assert_eq!(source.warehouse, Some(WarehouseOutcome::Loaded { rows: 3 }));
    assert_eq!(site.requests.load(Ordering::SeqCst), 2);

    let rows = warehouse.warehouse_rows("stg_otodom").await.unwrap();
    let ids: HashSet<&str> = rows.iter().map(|row| row[2].as_str()).collect();
    assert_eq!(ids, HashSet::from(["promo", "a", "c"]));
    assert!(dir.path().join("offers/otodom_2021_04_02.csv").exists());
}

#[tokio::test]
async fn test_rerun_same_day_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = Arc::new(LocalWarehouse::in_memory());
    pipeline(site(), dir.path(), warehouse.clone()).run(ds()).await;

    let site = site();
    let report = pipeline(site.clone(), dir.path(), warehouse.clone())
        .run(ds())
        .await;

    let source = &report.sources[0];
    assert_eq!(source.scrape, Some(ScrapeOutcome::Skipped));
    assert_eq!(source.stage, Some(StageOutcome::AlreadyStaged));
    assert!(matches!(
        source.warehouse,
        Some(WarehouseOutcome::BackwardLoadRejected { .. })
    ));
    assert_eq!(site.requests.load(Ordering::SeqCst), 0);
    assert_eq!(warehouse.entries("stg_otodom").await.unwrap().len(), 2);
    assert_eq!(warehouse.staging_rows("stg_otodom").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_existing_snapshot_skips_network_entirely() {
    let dir = tempfile::tempdir().unwrap();
    let store = OfferStore::new(dir.path().join("offers"));
    store.write_snapshot("otodom", ds(), &[]).unwrap();

    let site = site();
    let warehouse = Arc::new(LocalWarehouse::in_memory());
    let report = pipeline(site.clone(), dir.path(), warehouse).run(ds()).await;

    assert_eq!(report.sources[0].scrape, Some(ScrapeOutcome::Skipped));
    assert_eq!(site.requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_outage_publishes_nothing_and_next_run_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let down = Arc::new(StaticSite {
        pages: HashMap::new(),
        requests: AtomicUsize::new(0),
    });
    let warehouse = Arc::new(LocalWarehouse::in_memory());

    let report = pipeline(down, dir.path(), warehouse.clone()).run(ds()).await;

    assert!(!report.is_success());
    let source = &report.sources[0];
    assert_eq!(source.scrape, None);
    assert_eq!(source.stage, None);
    assert_eq!(source.warehouse, None);
    assert!(source.error.as_deref().unwrap().contains("No listing page"));
    assert!(!dir.path().join("offers/otodom_2021_04_02.csv").exists());
    assert!(warehouse.entries("stg_otodom").await.unwrap().is_empty());

    let up = site();
    let report = pipeline(up.clone(), dir.path(), warehouse.clone())
        .run(ds())
        .await;

    assert!(report.is_success());
    let source = &report.sources[0];
    assert!(matches!(
        source.scrape,
        Some(ScrapeOutcome::Scraped { offers: 3, .. })
    ));
    assert_eq!(source.warehouse, Some(WarehouseOutcome::Loaded { rows: 3 }));
    assert_eq!(up.requests.load(Ordering::SeqCst), 2);
}
