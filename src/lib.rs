//! Daily otodom.pl offer scraping with a staged, resumable warehouse load.

pub mod config;
pub mod dedup;
pub mod error;
pub mod etl;
pub mod models;
pub mod parsing;
pub mod scrapers;
pub mod store;
