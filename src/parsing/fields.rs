use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;

fn room_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*(?:pokój|pokoje|pokoi)").expect("valid room regex"))
}

fn page_count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""page_count":"(\d+)""#).expect("valid page count regex"))
}

fn price_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([\d\s,]+)zł").expect("valid price regex"))
}

fn area_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([\d\s,]+)m²").expect("valid area regex"))
}

/// Parse a number written with space thousands separators and a comma
/// decimal separator, e.g. `"1 234,50"`.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Room count from a detail line such as `"3 pokoje"`
pub fn parse_room_count(line: &str) -> Option<u32> {
    room_regex()
        .captures(line)
        .and_then(|caps| caps[1].parse().ok())
}

/// Price in a line like `"1 234,50 zł/miesiąc"`
pub fn parse_price(line: &str) -> Option<Decimal> {
    price_regex()
        .captures(line)
        .and_then(|caps| parse_decimal(&caps[1]))
}

/// Area in a line like `"48,5 m²"`
pub fn parse_area(line: &str) -> Option<Decimal> {
    area_regex()
        .captures(line)
        .and_then(|caps| parse_decimal(&caps[1]))
}

/// Total number of pages advertised in a listing body
pub fn parse_page_count(body: &str) -> Option<u32> {
    page_count_regex()
        .captures(body)
        .and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_decimal_with_locale_separators() {
        assert_eq!(parse_decimal("1 234,50"), Some(Decimal::new(123450, 2)));
        assert_eq!(parse_decimal("1\u{a0}000"), Some(Decimal::new(1000, 0)));
        assert_eq!(parse_decimal("48"), Some(Decimal::new(48, 0)));
        assert_eq!(parse_decimal("  "), None);
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn test_price_line() {
        assert_eq!(
            parse_price("1 234,50 zł/miesiąc"),
            Some(Decimal::new(123450, 2))
        );
        assert_eq!(parse_price("549 000 zł"), Some(Decimal::new(549000, 0)));
        assert_eq!(parse_price("Zapytaj o cenę"), None);
    }

    #[test]
    fn test_area_line() {
        assert_eq!(parse_area("48,5 m²"), Some(Decimal::new(485, 1)));
        assert_eq!(parse_area("120 m²"), Some(Decimal::new(120, 0)));
        assert_eq!(parse_area("3 pokoje"), None);
    }

    #[test]
    fn test_room_count() {
        assert_eq!(parse_room_count("3 pokoje"), Some(3));
        assert_eq!(parse_room_count("1 pokój"), Some(1));
        assert_eq!(parse_room_count("5 pokoi"), Some(5));
        assert_eq!(parse_room_count("2 500 zł"), None);
    }

    #[test]
    fn test_page_count_marker() {
        let body = r#"<script>var x = {"page_count":"17","total":1200};</script>"#;
        assert_eq!(parse_page_count(body), Some(17));
        assert_eq!(parse_page_count("<html></html>"), None);
    }
}
