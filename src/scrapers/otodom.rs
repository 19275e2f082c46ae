use crate::scrapers::discovery::{load_seeds, ListingDiscoverer};
use crate::scrapers::extract::OfferExtractor;
use crate::scrapers::fetch::PageFetcher;
use crate::scrapers::traits::ListingSource;
use crate::scrapers::types::{CrawlParams, ListingFailure, ScrapeReport};
use crate::store::OfferStore;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// otodom.pl flat listings scraper
pub struct OtodomScraper {
    fetcher: PageFetcher,
    discoverer: ListingDiscoverer,
    extractor: OfferExtractor,
    store: OfferStore,
    params: CrawlParams,
}

impl OtodomScraper {
    pub fn new(fetcher: PageFetcher, store: OfferStore, params: CrawlParams) -> Self {
        Self {
            discoverer: ListingDiscoverer::new(params.allowed_cities.clone()),
            extractor: OfferExtractor::new(),
            fetcher,
            store,
            params,
        }
    }

    pub fn with_discoverer(mut self, discoverer: ListingDiscoverer) -> Self {
        self.discoverer = discoverer;
        self
    }
}

#[async_trait]
impl ListingSource for OtodomScraper {
    async fn scrape(&self) -> Result<ScrapeReport> {
        info!("Starting otodom scrape");

        let seeds = load_seeds(&self.params.seed_file).with_context(|| {
            format!("Failed to read seed file {}", self.params.seed_file.display())
        })?;
        let targets = self.discoverer.discover(&self.fetcher, &seeds).await;

        let mut report = ScrapeReport {
            listings_total: targets.len(),
            ..ScrapeReport::default()
        };

        for (idx, target) in targets.iter().enumerate() {
            let remaining = match self.params.page_limit {
                Some(limit) if report.pages_fetched as u32 >= limit => {
                    info!("Page limit of {} reached, stopping", limit);
                    break;
                }
                Some(limit) => Some(limit - report.pages_fetched as u32),
                None => None,
            };

            debug!(
                "Process listing: {} [{}/{}]",
                target.url,
                idx + 1,
                targets.len()
            );

            let pages = match self.fetcher.fetch_listing(&target.url, remaining).await {
                Ok(pages) => pages,
                Err(err) => {
                    warn!("Skipping listing {}: {}", target.url, err);
                    report.failures.push(ListingFailure {
                        url: target.url.clone(),
                        page: None,
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            for (page, body) in &pages.bodies {
                let extraction = self.extractor.extract_page(body, target.offer_type);
                debug!(
                    "{} page {}: {} offers, {} rejected",
                    target.url,
                    page,
                    extraction.offers.len(),
                    extraction.rejected.len()
                );
                report.cards_rejected += extraction.rejected.len();
                report.offers.extend(extraction.offers);
                report.pages_fetched += 1;
            }

            if let Some((page, err)) = pages.failed {
                warn!("Listing {} stopped at page {}: {}", target.url, page, err);
                report.failures.push(ListingFailure {
                    url: target.url.clone(),
                    page: Some(page),
                    error: err.to_string(),
                });
            }
        }

        if report.pages_fetched == 0 && !report.failures.is_empty() {
            bail!(
                "No listing page could be fetched ({} of {} listings failed)",
                report.failures.len(),
                report.listings_total
            );
        }

        info!(
            "Got {} offers from {} pages of {} listings ({} failures)",
            report.offers.len(),
            report.pages_fetched,
            report.listings_total,
            report.failures.len()
        );
        Ok(report)
    }

    fn source_id(&self) -> &'static str {
        "otodom"
    }

    fn store(&self) -> &OfferStore {
        &self.store
    }
}
