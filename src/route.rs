//! Route code normalization.
//!
//! The feed reports route codes with operator-specific offsets: suburban
//! lines 600-613 carry a thousands prefix (e.g. `1605`), city lines 1-30 a
//! hundreds prefix (e.g. `215`). Codes that fit neither scheme, such as club
//! or charter codes, are shown as reported.

use std::ops::RangeInclusive;

/// Shown when the feed has no usable route code
pub const NO_LINE: &str = "N/A";

const SUBURBAN_LINES: RangeInclusive<i64> = 600..=613;
const CITY_LINES: RangeInclusive<i64> = 1..=30;

/// Map a raw route code to the line number passengers know.
pub fn normalize_line(route_code: Option<&str>) -> String {
    let raw = match route_code {
        Some(code) if !code.is_empty() => code,
        _ => return NO_LINE.to_string(),
    };

    let Ok(code) = raw.parse::<i64>() else {
        return raw.to_string();
    };

    // Suburban first: 1605 would otherwise read as city line 5
    let suburban = code.rem_euclid(1000);
    if SUBURBAN_LINES.contains(&suburban) {
        return suburban.to_string();
    }

    let city = code.rem_euclid(100);
    if CITY_LINES.contains(&city) {
        return city.to_string();
    }

    if CITY_LINES.contains(&code) || SUBURBAN_LINES.contains(&code) {
        return code.to_string();
    }

    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suburban_codes() {
        assert_eq!(normalize_line(Some("605")), "605");
        assert_eq!(normalize_line(Some("1605")), "605");
        assert_eq!(normalize_line(Some("2613")), "613");
        assert_eq!(normalize_line(Some("600")), "600");
    }

    #[test]
    fn city_codes() {
        assert_eq!(normalize_line(Some("15")), "15");
        assert_eq!(normalize_line(Some("215")), "15");
        assert_eq!(normalize_line(Some("1030")), "30");
        assert_eq!(normalize_line(Some("101")), "1");
    }

    #[test]
    fn suburban_check_wins_over_city_check() {
        // 1607 % 100 = 7 is a valid city line, but 1607 % 1000 = 607 is checked first
        assert_eq!(normalize_line(Some("1607")), "607");
    }

    #[test]
    fn unrecognized_codes_pass_through() {
        assert_eq!(normalize_line(Some("abc")), "abc");
        assert_eq!(normalize_line(Some("9999")), "9999");
        assert_eq!(normalize_line(Some("0")), "0");
        assert_eq!(normalize_line(Some("650")), "650");
        assert_eq!(normalize_line(Some("12a")), "12a");
    }

    #[test]
    fn formatting_of_recognized_codes_is_canonical() {
        assert_eq!(normalize_line(Some("007")), "7");
        assert_eq!(normalize_line(Some("+15")), "15");
    }

    #[test]
    fn missing_codes() {
        assert_eq!(normalize_line(None), NO_LINE);
        assert_eq!(normalize_line(Some("")), NO_LINE);
    }
}
