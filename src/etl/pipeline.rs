use crate::dedup::dedup_offers;
use crate::etl::tracker::{StageOutcome, Tracker, WarehouseOutcome};
use crate::scrapers::types::ListingFailure;
use crate::scrapers::ListingSource;
use chrono::NaiveDate;
use tracing::{error, info, info_span, warn, Instrument};

#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    /// A snapshot for the day was already on disk
    Skipped,
    Scraped {
        offers: usize,
        failures: Vec<ListingFailure>,
    },
}

/// What happened to one source during a run
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source_id: String,
    pub scrape: Option<ScrapeOutcome>,
    pub stage: Option<StageOutcome>,
    pub warehouse: Option<WarehouseOutcome>,
    /// Set when the source stopped before finishing all steps
    pub error: Option<String>,
}

impl SourceReport {
    fn new(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            scrape: None,
            stage: None,
            warehouse: None,
            error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub ds: NaiveDate,
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.sources.iter().all(SourceReport::is_complete)
    }
}

/// Staging table fed by a source
pub fn staging_table(source_id: &str) -> String {
    format!("stg_{source_id}")
}

/// Scrape, store, stage and warehouse every source for one day
pub struct Pipeline {
    sources: Vec<Box<dyn ListingSource>>,
    tracker: Tracker,
}

impl Pipeline {
    pub fn new(sources: Vec<Box<dyn ListingSource>>, tracker: Tracker) -> Self {
        Self { sources, tracker }
    }

    pub async fn run(&self, ds: NaiveDate) -> RunReport {
        let mut sources = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let span = info_span!("run", source = source.source_id(), %ds);
            sources.push(self.run_source(source.as_ref(), ds).instrument(span).await);
        }
        RunReport { ds, sources }
    }

    async fn run_source(&self, source: &dyn ListingSource, ds: NaiveDate) -> SourceReport {
        let mut report = SourceReport::new(source.source_id());

        if source.snapshot_exists(ds) {
            info!("Data exists on disk for {}, no need to scrape", ds);
            report.scrape = Some(ScrapeOutcome::Skipped);
        } else {
            let scraped = match source.scrape().await {
                Ok(scraped) => scraped,
                Err(err) => {
                    error!("Scrape failed: {:#}", err);
                    report.error = Some(format!("scrape: {err:#}"));
                    return report;
                }
            };
            for failure in &scraped.failures {
                warn!(
                    "Listing {} failed at page {:?}: {}",
                    failure.url, failure.page, failure.error
                );
            }

            let offers = dedup_offers(scraped.offers);
            info!("Got total {} offers", offers.len());
            if let Err(err) = source.store_snapshot(ds, &offers) {
                error!("Storing snapshot failed: {}", err);
                report.error = Some(format!("store: {err}"));
                return report;
            }
            report.scrape = Some(ScrapeOutcome::Scraped {
                offers: offers.len(),
                failures: scraped.failures,
            });
        }

        let table = staging_table(source.source_id());
        match self.tracker.stage(&table, ds, &source.snapshot_path(ds)).await {
            Ok(outcome) => report.stage = Some(outcome),
            Err(err) => {
                error!("Staging {} failed: {}", table, err);
                report.error = Some(format!("stage: {err}"));
                return report;
            }
        }

        match self.tracker.warehouse_load(&table, ds).await {
            Ok(outcome) => report.warehouse = Some(outcome),
            Err(err) => {
                error!("Warehouse load of {} failed: {}", table, err);
                report.error = Some(format!("warehouse: {err}"));
            }
        }

        report
    }
}
