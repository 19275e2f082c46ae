use crate::error::StoreError;
use crate::models::Offer;
use crate::scrapers::types::ScrapeReport;
use crate::store::OfferStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;

/// Common trait for all listing sources.
/// A source knows how to crawl its site and where its daily snapshots live.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Short identifier used in snapshot names and table names
    fn source_id(&self) -> &'static str;

    /// Crawl the site and return every offer found
    async fn scrape(&self) -> Result<ScrapeReport>;

    fn store(&self) -> &OfferStore;

    fn snapshot_exists(&self, ds: NaiveDate) -> bool {
        self.store().snapshot_exists(self.source_id(), ds)
    }

    fn snapshot_path(&self, ds: NaiveDate) -> PathBuf {
        self.store().snapshot_path(self.source_id(), ds)
    }

    fn store_snapshot(&self, ds: NaiveDate, offers: &[Offer]) -> Result<PathBuf, StoreError> {
        self.store().write_snapshot(self.source_id(), ds, offers)
    }
}
