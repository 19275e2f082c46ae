use crate::models::Offer;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Crawl parameters of a listing source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlParams {
    /// Newline-delimited listing URLs to start from
    pub seed_file: PathBuf,
    /// Only crawl these city keys; `None` crawls every seed
    pub allowed_cities: Option<HashSet<String>>,
    /// Stop after this many listing pages in total
    pub page_limit: Option<u32>,
}

/// A listing (or one of its pages) that could not be retrieved
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingFailure {
    pub url: String,
    /// `None` when the listing failed before its first page was read
    pub page: Option<u32>,
    pub error: String,
}

/// Everything one scrape produced, including what went wrong
#[derive(Debug, Default)]
pub struct ScrapeReport {
    pub offers: Vec<Offer>,
    pub listings_total: usize,
    pub pages_fetched: usize,
    pub cards_rejected: usize,
    pub failures: Vec<ListingFailure>,
}

impl ScrapeReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}
