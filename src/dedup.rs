use crate::models::Offer;
use std::collections::HashSet;
use tracing::debug;

/// Canonical string form of an offer: its fields serialized with keys in
/// sorted order.
fn canonical(offer: &Offer) -> String {
    // serde_json::Value keeps object keys in a BTreeMap
    serde_json::to_value(offer)
        .map(|value| value.to_string())
        .unwrap_or_else(|_| format!("{offer:?}"))
}

/// Drop offers that are identical in every field, keeping the first
/// occurrence.
///
/// Promoted offers show up on several pages of the same listing. Two
/// distinct offers that happen to agree on every field are collapsed too;
/// `source_offer_id` is not stable enough to key on instead.
pub fn dedup_offers(offers: Vec<Offer>) -> Vec<Offer> {
    let before = offers.len();
    let mut seen = HashSet::with_capacity(before);
    let unique: Vec<Offer> = offers
        .into_iter()
        .filter(|offer| seen.insert(canonical(offer)))
        .collect();
    debug!("Dedup kept {} of {} offers", unique.len(), before);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Location, OfferType};
    use rust_decimal::Decimal;

    fn offer(id: &str, price: i64) -> Offer {
        Offer {
            source_offer_id: id.to_string(),
            offer_type: OfferType::Rent,
            title: "Kawalerka".to_string(),
            url: format!("https://www.otodom.pl/oferta/{id}"),
            location_raw: "Gdańsk, Jelitkowo".to_string(),
            location: Location {
                city: "gdańsk".to_string(),
                district: Some("jelitkowo".to_string()),
                ..Location::default()
            },
            room_count: Some(1),
            price: Decimal::new(price, 0),
            area: Decimal::new(28, 0),
            offer_source: "Biuro".to_string(),
        }
    }

    #[test]
    fn test_exact_duplicates_collapse() {
        let offers = vec![offer("a", 1800), offer("b", 2100), offer("a", 1800), offer("c", 2500)];
        let unique = dedup_offers(offers);
        let ids: Vec<&str> = unique.iter().map(|o| o.source_offer_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_same_id_different_fields_are_kept() {
        let unique = dedup_offers(vec![offer("a", 1800), offer("a", 1900)]);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let offers = vec![offer("a", 1), offer("a", 1), offer("a", 1), offer("b", 2)];
        let once = dedup_offers(offers.clone());
        let twice = dedup_offers(once.clone());
        assert_eq!(once, twice);
        assert!(once.len() <= offers.len());
    }
}
