use crate::models::{ListingTarget, OfferType};
use crate::scrapers::fetch::PageFetcher;
use scraper::{Html, Selector};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

/// Path prefixes of flat listings, longest match first
const LISTING_PREFIXES: [&str; 3] = [
    "sprzedaz/nowe-mieszkanie/",
    "sprzedaz/mieszkanie/",
    "wynajem/mieszkanie/",
];

/// Cities whose listing page links to further sub-region listings
pub const SUBREGION_CITIES: &[&str] = &[
    "jelenia-gora", "legnica", "lubin", "walbrzych", "wroclaw", "bydgoszcz", "grudziadz",
    "inowroclaw", "torun", "wloclawek", "lodz", "pabianice", "piotrkow-trybunalski",
    "tomaszow-mazowiecki", "chelm", "lublin", "zamosc", "gorzow-wielkopolski",
    "zielona-gora", "krakow", "nowy-sacz", "tarnow", "plock", "pruszkow", "radom",
    "warszawa", "kedzierzyn-kozle", "rzeszow", "bialystok", "lomza", "gdansk", "gdynia",
    "sopot", "tczew", "bedzin", "bielsko-biala", "chorzow", "czestochowa", "dabrowa-gornicza",
    "jastrzebie-zdroj", "jaworzno", "katowice", "mikolow", "myslowice", "rybnik",
    "siemianowice-slaskie", "sosnowiec", "swietochlowice", "tarnowskie-gory", "tychy",
    "zabrze", "zory", "kielce", "ostrowiec-swietokrzyski", "elblag", "olsztyn", "gniezno",
    "kalisz", "konin", "leszno", "ostrow-wielkopolski", "pila", "kolobrzeg", "koszalin",
    "stargard", "szczecin",
];

/// Cities scraped by default
pub const DEFAULT_CITIES: &[&str] = &[
    "bydgoszcz", "gdansk", "katowice", "krakow", "lodz", "lublin", "lubin", "poznan",
    "szczecin", "warszawa", "wroclaw", "gdynia", "zielona-gora", "leszno", "jelenia-gora",
    "swidnica",
];

/// Read a newline-delimited seed file. Blank lines and `#` comments are skipped.
pub fn load_seeds(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let seeds: BTreeSet<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect();
    Ok(seeds.into_iter().collect())
}

fn listing_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    Some(parsed.path().trim_start_matches('/').to_string())
}

/// Offer type implied by a listing URL; `None` for anything that is not a
/// flat listing
pub fn classify(url: &str) -> Option<OfferType> {
    let path = listing_path(url)?;
    if path.contains("wynajem") {
        Some(OfferType::Rent)
    } else if path.contains("sprzedaz/mieszkanie") {
        Some(OfferType::Sell)
    } else if path.contains("sprzedaz/nowe-mieszkanie") {
        Some(OfferType::SellNew)
    } else {
        None
    }
}

/// City key of a listing URL, e.g. `wroclaw` for
/// `https://www.otodom.pl/wynajem/mieszkanie/wroclaw/psie-pole/`
pub fn city_key(url: &str) -> Option<String> {
    let path = listing_path(url)?;
    let rest = LISTING_PREFIXES
        .iter()
        .find_map(|prefix| path.strip_prefix(prefix))?;
    rest.split('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(String::from)
}

/// Links of the "related locations" panel; `None` when the panel is absent
pub fn parse_location_links(html: &str, base: &Url) -> Option<Vec<String>> {
    let document = Html::parse_document(html);
    let panel_selector = Selector::parse("div#locationLinks").unwrap();
    let link_selector = Selector::parse("a[href]").unwrap();

    let panel = document.select(&panel_selector).next()?;
    let links = panel
        .select(&link_selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| *href != "#")
        .filter_map(|href| base.join(href).ok())
        .map(String::from)
        .collect();
    Some(links)
}

/// Resolves the set of listings to crawl from the seed URLs
pub struct ListingDiscoverer {
    allowed_cities: Option<HashSet<String>>,
    subregion_cities: HashSet<String>,
}

impl ListingDiscoverer {
    pub fn new(allowed_cities: Option<HashSet<String>>) -> Self {
        Self {
            allowed_cities,
            subregion_cities: SUBREGION_CITIES.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn with_subregion_cities(mut self, cities: HashSet<String>) -> Self {
        self.subregion_cities = cities;
        self
    }

    /// Seed listings plus one level of sub-region listings, filtered and
    /// classified. URLs that are not flat listings are dropped on purpose.
    pub async fn discover(&self, fetcher: &PageFetcher, seeds: &[String]) -> Vec<ListingTarget> {
        let mut frontier: BTreeSet<String> = seeds.iter().cloned().collect();

        let expandable: Vec<&String> = seeds
            .iter()
            .filter(|seed| {
                city_key(seed).is_some_and(|key| self.subregion_cities.contains(&key))
                    && self.is_allowed(seed)
            })
            .collect();

        for (idx, seed) in expandable.iter().enumerate() {
            debug!(
                "Getting extra listings from: {} [{}/{}]",
                seed,
                idx + 1,
                expandable.len()
            );
            frontier.extend(self.expand(fetcher, seed).await);
        }

        let targets: Vec<ListingTarget> = frontier
            .into_iter()
            .filter(|url| self.is_allowed(url))
            .filter_map(|url| {
                let Some(offer_type) = classify(&url) else {
                    debug!("Not a flat listing, dropping {}", url);
                    return None;
                };
                let city_key = city_key(&url).unwrap_or_default();
                Some(ListingTarget {
                    url,
                    offer_type,
                    city_key,
                })
            })
            .collect();

        info!(
            "Discovered {} listings from {} seeds",
            targets.len(),
            seeds.len()
        );
        targets
    }

    fn is_allowed(&self, url: &str) -> bool {
        match &self.allowed_cities {
            None => true,
            Some(allowed) => city_key(url).is_some_and(|key| allowed.contains(&key)),
        }
    }

    async fn expand(&self, fetcher: &PageFetcher, seed: &str) -> Vec<String> {
        let base = match Url::parse(seed) {
            Ok(base) => base,
            Err(err) => {
                warn!("Skipping expansion of invalid seed {}: {}", seed, err);
                return Vec::new();
            }
        };

        let body = match fetcher.fetch(seed).await {
            Ok(body) => body,
            Err(err) => {
                warn!("Could not fetch {} for sub-regions: {}", seed, err);
                return Vec::new();
            }
        };

        match parse_location_links(&body, &base) {
            Some(links) => {
                debug!("Found {} sub-region links on {}", links.len(), seed);
                links
            }
            None => {
                warn!("No location links panel on {}", seed);
                Vec::new()
            }
        }
    }
}
