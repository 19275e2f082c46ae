pub mod discovery;
pub mod extract;
pub mod fetch;
pub mod otodom;
pub mod traits;
pub mod types;

pub use discovery::ListingDiscoverer;
pub use extract::OfferExtractor;
pub use fetch::{HttpClient, PageFetcher, PageSource, Pacer, RetryPolicy, UserAgentPool};
pub use otodom::OtodomScraper;
pub use traits::ListingSource;
pub use types::{CrawlParams, ScrapeReport};
