use crate::error::FetchError;
use crate::parsing::parse_page_count;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONNECTION, USER_AGENT};
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Offers per listing page; the largest value the site accepts
pub const PAGE_SIZE: u32 = 72;

const FALLBACK_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Transport used to retrieve listing pages
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get(&self, url: &str, query: &[(&'static str, String)]) -> Result<String, FetchError>;
}

/// Pool of user-agent strings, one picked at random per request
#[derive(Debug, Clone, Default)]
pub struct UserAgentPool {
    agents: Vec<String>,
}

impl UserAgentPool {
    pub fn new(agents: Vec<String>) -> Self {
        Self { agents }
    }

    /// One user-agent per line; blank lines are ignored
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
        ))
    }

    pub fn pick(&self) -> &str {
        self.agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(FALLBACK_USER_AGENT)
    }
}

/// reqwest-backed page source with the site's baseline headers
pub struct HttpClient {
    client: Client,
    user_agents: UserAgentPool,
}

impl HttpClient {
    pub fn new(timeout: Duration, user_agents: UserAgentPool) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            user_agents,
        })
    }
}

#[async_trait]
impl PageSource for HttpClient {
    async fn get(&self, url: &str, query: &[(&'static str, String)]) -> Result<String, FetchError> {
        debug!("Fetching URL: {} {:?}", url, query);

        let response = self
            .client
            .get(url)
            .query(query)
            .header(USER_AGENT, self.user_agents.pick())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        debug!("Downloaded {} bytes of HTML", body.len());
        Ok(body)
    }
}

/// Randomized delay between consecutive requests to the site
#[derive(Debug, Clone)]
pub struct Pacer {
    min: Duration,
    max: Duration,
}

impl Pacer {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// No waiting at all
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Uniform draw from `[min, max)`
    pub fn next_delay(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..self.max)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            debug!("Sleeping {:?} before next request", delay);
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(2))
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt + 1`, doubling each time
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }
}

/// All pages of one listing that could be retrieved
#[derive(Debug)]
pub struct ListingPages {
    /// `(page index, body)` in page order
    pub bodies: Vec<(u32, String)>,
    /// The page that stopped the listing early, if any
    pub failed: Option<(u32, FetchError)>,
}

/// Paced, retried retrieval of paginated listings
#[derive(Clone)]
pub struct PageFetcher {
    source: Arc<dyn PageSource>,
    pacer: Pacer,
    retry: RetryPolicy,
}

impl PageFetcher {
    pub fn new(source: Arc<dyn PageSource>, pacer: Pacer, retry: RetryPolicy) -> Self {
        Self {
            source,
            pacer,
            retry,
        }
    }

    /// Fetch a URL without listing parameters (used for discovery)
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.request(url, &[]).await
    }

    /// Fetch one page of a listing
    pub async fn fetch_page(&self, url: &str, page: u32) -> Result<String, FetchError> {
        let mut query = vec![("nrAdsPerPage", PAGE_SIZE.to_string())];
        if page > 1 {
            query.push(("page", page.to_string()));
        }
        self.request(url, &query).await
    }

    /// Fetch every page of a listing, at most `max_pages` of them.
    ///
    /// Fails only when page 1 cannot be retrieved or carries no page count.
    /// A later failure ends the listing early and is reported in
    /// [`ListingPages::failed`].
    pub async fn fetch_listing(
        &self,
        url: &str,
        max_pages: Option<u32>,
    ) -> Result<ListingPages, FetchError> {
        let first = self.fetch_page(url, 1).await?;
        let page_count = parse_page_count(&first)
            .ok_or_else(|| FetchError::MissingPageCount {
                url: url.to_string(),
            })?
            .max(1);
        let last = max_pages.map_or(page_count, |limit| page_count.min(limit.max(1)));
        debug!("Listing {} has {} page(s), fetching {}", url, page_count, last);

        let mut pages = ListingPages {
            bodies: vec![(1, first)],
            failed: None,
        };

        for page in 2..=last {
            match self.fetch_page(url, page).await {
                Ok(body) => pages.bodies.push((page, body)),
                Err(err) => {
                    pages.failed = Some((page, err));
                    break;
                }
            }
        }

        Ok(pages)
    }

    async fn request(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            let result = self.source.get(url, query).await;
            self.pacer.pause().await;

            match result {
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    let backoff = self.retry.backoff_for(attempt);
                    attempt += 1;
                    warn!(
                        "Request to {} failed ({}), retry {}/{} in {:?}",
                        url, err, attempt, self.retry.max_retries, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Canned responses keyed by `url?page=N`, recorded requests for assertions
    #[derive(Default)]
    pub struct FakeSite {
        pages: Mutex<HashMap<String, VecDeque<Result<String, u16>>>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FakeSite {
        pub fn key(url: &str, query: &[(&'static str, String)]) -> String {
            let page = query
                .iter()
                .find(|(name, _)| *name == "page")
                .map(|(_, value)| value.clone());
            match (query.is_empty(), page) {
                (true, _) => url.to_string(),
                (false, None) => format!("{url}?page=1"),
                (false, Some(page)) => format!("{url}?page={page}"),
            }
        }

        /// Queue a response; the last queued response repeats forever
        pub fn respond(&self, key: &str, response: Result<&str, u16>) {
            self.pages
                .lock()
                .unwrap()
                .entry(key.to_string())
                .or_default()
                .push_back(response.map(String::from));
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PageSource for FakeSite {
        async fn get(
            &self,
            url: &str,
            query: &[(&'static str, String)],
        ) -> Result<String, FetchError> {
            let key = Self::key(url, query);
            self.requests.lock().unwrap().push(key.clone());

            let mut pages = self.pages.lock().unwrap();
            let queue = pages.get_mut(&key);
            let response = match queue {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            };
            match response {
                Some(Ok(body)) => Ok(body),
                Some(Err(status)) => Err(FetchError::Status { url: key, status }),
                None => Err(FetchError::Status { url: key, status: 404 }),
            }
        }
    }
}
