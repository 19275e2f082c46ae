use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of listing an offer was found on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    Rent,
    Sell,
    SellNew,
}

impl OfferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferType::Rent => "rent",
            OfferType::Sell => "sell",
            OfferType::SellNew => "sell_new",
        }
    }
}

impl fmt::Display for OfferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Administrative breakdown of a free-text location.
///
/// Either the `county`/`province` pair or the `district`/`neighbourhood`
/// pair is filled, never both.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub province: Option<String>,
    pub county: Option<String>,
    pub city: String,
    pub district: Option<String>,
    pub neighbourhood: Option<String>,
}

/// One advertised property extracted from a listing page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Offer {
    pub source_offer_id: String,
    pub offer_type: OfferType,
    pub title: String,
    pub url: String,
    pub location_raw: String,
    #[serde(flatten)]
    pub location: Location,
    pub room_count: Option<u32>,
    pub price: Decimal,
    pub area: Decimal,
    pub offer_source: String,
}

/// A crawlable listing page together with its inferred classification
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListingTarget {
    pub url: String,
    pub offer_type: OfferType,
    pub city_key: String,
}

/// Progress row for one (table, ds) pair in the ETL tracker log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerEntry {
    pub table_name: String,
    pub ds: NaiveDate,
    pub staged: bool,
    pub staged_at: Option<DateTime<Utc>>,
    pub warehoused: bool,
    pub warehoused_at: Option<DateTime<Utc>>,
}
