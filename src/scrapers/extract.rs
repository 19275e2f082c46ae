use crate::error::ExtractionError;
use crate::models::{Offer, OfferType};
use crate::parsing::{
    parse_area, parse_location, parse_price, parse_room_count, CapitalizedPlaceNames,
    PlaceClassifier,
};
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Placeholder shown instead of a price
const ASK_FOR_PRICE: &str = "Zapytaj o cenę";

/// Offers read from one listing page
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub offers: Vec<Offer>,
    /// Cards that looked like offers but could not be parsed
    pub rejected: Vec<ExtractionError>,
    /// Cards deliberately left out (no price given)
    pub ignored: usize,
}

/// Turns otodom listing pages into [`Offer`] records
pub struct OfferExtractor {
    classifier: Box<dyn PlaceClassifier>,
    card_id: Regex,
    rent_location: Regex,
    sale_location: Regex,
    article: Selector,
    title: Selector,
    link: Selector,
    paragraph: Selector,
    details: Selector,
    footer: Selector,
}

impl OfferExtractor {
    pub fn new() -> Self {
        Self::with_classifier(Box::new(CapitalizedPlaceNames))
    }

    pub fn with_classifier(classifier: Box<dyn PlaceClassifier>) -> Self {
        Self {
            classifier,
            card_id: Regex::new(r"^offer-item-ad_id(.+)$").unwrap(),
            rent_location: Regex::new(r"Mieszkanie na wynajem:\s*(.*)").unwrap(),
            sale_location: Regex::new(r"Mieszkanie na sprzedaż:\s*(.*)").unwrap(),
            article: Selector::parse("article").unwrap(),
            title: Selector::parse(".offer-item-title").unwrap(),
            link: Selector::parse("a[href]").unwrap(),
            paragraph: Selector::parse("p").unwrap(),
            details: Selector::parse("ul.params li").unwrap(),
            footer: Selector::parse("div.offer-item-details-bottom li").unwrap(),
        }
    }

    /// Extract every offer card of a listing page. Ads and banners without an
    /// offer id are skipped silently.
    pub fn extract_page(&self, html: &str, offer_type: OfferType) -> PageExtraction {
        let document = Html::parse_document(html);
        let mut page = PageExtraction::default();

        for article in document.select(&self.article) {
            let Some(id) = article
                .value()
                .id()
                .and_then(|id| self.card_id.captures(id))
                .map(|caps| caps[1].to_string())
            else {
                continue;
            };

            match self.parse_card(article, &id, offer_type) {
                Ok(Some(offer)) => page.offers.push(offer),
                Ok(None) => {
                    debug!("Card {} has no price, ignoring", id);
                    page.ignored += 1;
                }
                Err(err) => {
                    warn!("Skipping offer card: {}", err);
                    page.rejected.push(err);
                }
            }
        }

        page
    }

    fn parse_card(
        &self,
        card: ElementRef<'_>,
        id: &str,
        offer_type: OfferType,
    ) -> Result<Option<Offer>, ExtractionError> {
        let missing = |what: &'static str| ExtractionError::Missing {
            id: id.to_string(),
            what,
        };

        let title = card
            .select(&self.title)
            .next()
            .map(text_of)
            .ok_or_else(|| missing("title"))?;
        let url = card
            .select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(String::from)
            .ok_or_else(|| missing("url"))?;

        let location_pattern = match offer_type {
            OfferType::Rent => &self.rent_location,
            OfferType::Sell | OfferType::SellNew => &self.sale_location,
        };
        let location_raw = card
            .select(&self.paragraph)
            .next()
            .map(text_of)
            .and_then(|text| {
                location_pattern
                    .captures(&text)
                    .map(|caps| caps[1].trim().to_string())
            })
            .ok_or_else(|| missing("location"))?;

        let details: Vec<String> = card.select(&self.details).map(text_of).collect();
        if details.len() < 2 {
            return Err(ExtractionError::TooFewDetails {
                id: id.to_string(),
                count: details.len(),
            });
        }
        if details.iter().any(|line| line.contains(ASK_FOR_PRICE)) {
            return Ok(None);
        }

        // Without a room count every following line moves up by one
        let room_count = parse_room_count(&details[0]);
        let price_idx = if room_count.is_some() { 1 } else { 0 };
        let price_line = &details[price_idx];
        let area_line = details.get(price_idx + 1).ok_or_else(|| missing("area"))?;

        let price = positive(parse_price(price_line)).ok_or_else(|| ExtractionError::Unparsable {
            id: id.to_string(),
            what: "price",
            raw: price_line.clone(),
        })?;
        let area = positive(parse_area(area_line)).ok_or_else(|| ExtractionError::Unparsable {
            id: id.to_string(),
            what: "area",
            raw: area_line.clone(),
        })?;

        let offer_source = card
            .select(&self.footer)
            .last()
            .map(text_of)
            .ok_or_else(|| missing("offer source"))?;

        let location = parse_location(&location_raw, self.classifier.as_ref());
        if location.city.is_empty() {
            return Err(missing("location"));
        }

        Ok(Some(Offer {
            source_offer_id: id.to_string(),
            offer_type,
            title,
            url,
            location_raw,
            location,
            room_count,
            price,
            area,
            offer_source,
        }))
    }
}

impl Default for OfferExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Element text with whitespace runs collapsed to single spaces
fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| v.is_sign_positive() && !v.is_zero())
}
