//! Small text parsers used by the offer extractor. None of them touch HTML
//! or the network.

pub mod fields;
pub mod location;

pub use fields::{parse_area, parse_decimal, parse_page_count, parse_price, parse_room_count};
pub use location::{parse_location, CapitalizedPlaceNames, PlaceClassifier};
