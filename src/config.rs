use crate::scrapers::discovery::DEFAULT_CITIES;
use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings, read from `LISTING_ETL_*` environment variables
#[derive(Debug, Clone)]
pub struct Settings {
    pub seed_file: PathBuf,
    pub snapshot_dir: PathBuf,
    pub warehouse_dir: PathBuf,
    /// One user-agent per line; the built-in agent is used when unset
    pub user_agents_file: Option<PathBuf>,
    /// `None` crawls every seeded city
    pub allowed_cities: Option<HashSet<String>>,
    pub delay_min: Duration,
    pub delay_max: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed_file: PathBuf::from("otodom_locations_urls.txt"),
            snapshot_dir: PathBuf::from("data/offers"),
            warehouse_dir: PathBuf::from("data/warehouse"),
            user_agents_file: None,
            allowed_cities: Some(DEFAULT_CITIES.iter().map(|c| c.to_string()).collect()),
            delay_min: Duration::from_millis(1000),
            delay_max: Duration::from_millis(2000),
            max_retries: 3,
            retry_backoff: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => Ok(Some(
            value
                .parse()
                .with_context(|| format!("{name} must be a valid number"))?,
        )),
        Err(_) => Ok(None),
    }
}

/// Comma-separated city keys; `*` disables the filter
fn parse_cities(value: &str) -> Option<HashSet<String>> {
    if value.trim() == "*" {
        return None;
    }
    Some(
        value
            .split(',')
            .map(|city| city.trim().to_lowercase())
            .filter(|city| !city.is_empty())
            .collect(),
    )
}

impl Settings {
    /// Load settings from the environment, falling back to defaults
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        let _ = dotenv();

        let mut settings = Self::default();
        if let Ok(path) = env::var("LISTING_ETL_SEED_FILE") {
            settings.seed_file = path.into();
        }
        if let Ok(path) = env::var("LISTING_ETL_SNAPSHOT_DIR") {
            settings.snapshot_dir = path.into();
        }
        if let Ok(path) = env::var("LISTING_ETL_WAREHOUSE_DIR") {
            settings.warehouse_dir = path.into();
        }
        settings.user_agents_file = env::var("LISTING_ETL_USER_AGENTS_FILE").ok().map(PathBuf::from);
        if let Ok(cities) = env::var("LISTING_ETL_CITIES") {
            settings.allowed_cities = parse_cities(&cities);
        }
        if let Some(ms) = parsed::<u64>("LISTING_ETL_DELAY_MIN_MS")? {
            settings.delay_min = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed::<u64>("LISTING_ETL_DELAY_MAX_MS")? {
            settings.delay_max = Duration::from_millis(ms);
        }
        if let Some(retries) = parsed::<u32>("LISTING_ETL_MAX_RETRIES")? {
            settings.max_retries = retries;
        }
        if let Some(ms) = parsed::<u64>("LISTING_ETL_RETRY_BACKOFF_MS")? {
            settings.retry_backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = parsed::<u64>("LISTING_ETL_TIMEOUT_SECS")? {
            settings.request_timeout = Duration::from_secs(secs);
        }

        anyhow::ensure!(
            settings.delay_min <= settings.delay_max,
            "LISTING_ETL_DELAY_MIN_MS must not exceed LISTING_ETL_DELAY_MAX_MS"
        );
        Ok(settings)
    }
}
