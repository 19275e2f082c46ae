use crate::models::Location;

/// Decides whether a location part names a place (district, neighbourhood)
/// rather than an administrative unit (county, province).
pub trait PlaceClassifier: Send + Sync {
    fn is_proper_name(&self, part: &str) -> bool;
}

/// Polish listings capitalize district and neighbourhood names while county
/// and province names are written in lower case.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapitalizedPlaceNames;

impl PlaceClassifier for CapitalizedPlaceNames {
    fn is_proper_name(&self, part: &str) -> bool {
        part.chars().next().is_some_and(char::is_uppercase)
    }
}

/// Parse a raw location such as `"Wrocław, Psie Pole, Lipa Piotrowska"`.
///
/// Recognised shapes:
/// - `City`
/// - `City, District` / `City, province`
/// - `City, District, Neighbourhood` / `City, county, province`
///
/// Anything longer keeps only the city.
pub fn parse_location(raw: &str, classifier: &dyn PlaceClassifier) -> Location {
    let parts: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    let mut location = Location {
        city: parts.first().map(|c| c.to_lowercase()).unwrap_or_default(),
        ..Location::default()
    };

    match parts.as_slice() {
        [_, second] => {
            if classifier.is_proper_name(second) {
                location.district = Some(second.to_lowercase());
            } else {
                location.province = Some(second.to_lowercase());
            }
        }
        [_, second, third] => {
            if classifier.is_proper_name(second) {
                location.district = Some(second.to_lowercase());
                location.neighbourhood = Some(third.to_lowercase());
            } else {
                location.county = Some(second.to_lowercase());
                location.province = Some(third.to_lowercase());
            }
        }
        _ => {}
    }

    location
}
