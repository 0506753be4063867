//! Text normalization: locale-formatted quantities and Spanish dates.
//!
//! Captured text comes from nested markup, so numbers and units are often
//! separated by newlines or runs of spaces. Every function here is total:
//! unparseable input yields `None`, never a panic.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;

static QUANTITY_RE: OnceLock<Option<Regex>> = OnceLock::new();
static QUANTITY_WITH_UNIT_RE: OnceLock<Option<Regex>> = OnceLock::new();
static NUMERIC_DATE_RE: OnceLock<Option<Regex>> = OnceLock::new();
static SPAN_DATE_RE: OnceLock<Option<Regex>> = OnceLock::new();
static WHITESPACE_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Storage unit as printed by the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataUnit {
    Kilobytes,
    Megabytes,
    Gigabytes,
    Terabytes,
}

impl DataUnit {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "KB" => Some(Self::Kilobytes),
            "MB" => Some(Self::Megabytes),
            "GB" => Some(Self::Gigabytes),
            "TB" => Some(Self::Terabytes),
            _ => None,
        }
    }

    /// Converts `value` in this unit to gigabytes (binary steps of 1024).
    pub fn to_gigabytes(self, value: f64) -> f64 {
        match self {
            Self::Kilobytes => value / (1024.0 * 1024.0),
            Self::Megabytes => value / 1024.0,
            Self::Gigabytes => value,
            Self::Terabytes => value * 1024.0,
        }
    }
}

/// Parses a number written with `,` or `.` as decimal separator.
///
/// When both separators appear, the rightmost one is the decimal separator and
/// the others are digit grouping (`1.024,5` and `1,024.5` are both 1024.5).
pub fn parse_locale_number(raw: &str) -> Option<f64> {
    let raw = raw.trim().trim_end_matches(['.', ',']);
    if raw.is_empty() {
        return None;
    }
    let decimal = match (raw.rfind(','), raw.rfind('.')) {
        (Some(c), Some(d)) => Some(c.max(d)),
        (Some(c), None) if raw.matches(',').count() == 1 => Some(c),
        (None, Some(d)) if raw.matches('.').count() == 1 => Some(d),
        _ => None,
    };
    let cleaned: String = raw
        .char_indices()
        .filter_map(|(i, ch)| match ch {
            '0'..='9' => Some(ch),
            ',' | '.' if Some(i) == decimal => Some('.'),
            _ => None,
        })
        .collect();
    cleaned.parse().ok()
}

/// Parses the first quantity in `text` and returns it in gigabytes.
///
/// A missing unit means gigabytes.
pub fn normalize_quantity(text: &str) -> Option<f64> {
    let re = cached(&QUANTITY_RE, r"(?i)(\d[\d.,]*)\s*(KB|MB|GB|TB)?\b")?;
    let caps = re.captures(text)?;
    let value = parse_locale_number(caps.get(1)?.as_str())?;
    let unit = caps
        .get(2)
        .and_then(|m| DataUnit::parse(m.as_str()))
        .unwrap_or(DataUnit::Gigabytes);
    Some(unit.to_gigabytes(value))
}

/// Every `<number><unit>` occurrence in document order, converted to GB,
/// together with the raw matched text.
pub fn find_quantities(text: &str) -> Vec<(f64, String)> {
    let Some(re) = cached(&QUANTITY_WITH_UNIT_RE, r"(?i)(\d[\d.,]*)\s*(KB|MB|GB|TB)\b") else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|caps| {
            let value = parse_locale_number(caps.get(1)?.as_str())?;
            let unit = DataUnit::parse(caps.get(2)?.as_str())?;
            let raw = collapse_whitespace(caps.get(0)?.as_str());
            Some((unit.to_gigabytes(value), raw))
        })
        .collect()
}

/// Collapses every whitespace run (newlines included) into one space and trims.
pub fn collapse_whitespace(text: &str) -> String {
    match cached(&WHITESPACE_RE, r"\s+") {
        Some(re) => re.replace_all(text.trim(), " ").into_owned(),
        None => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// Inclusive date range, e.g. a billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A parsed date: a single day or a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateValue {
    Day(NaiveDate),
    Span(DateSpan),
}

impl DateValue {
    pub fn as_day(&self) -> Option<NaiveDate> {
        match self {
            Self::Day(d) => Some(*d),
            Self::Span(_) => None,
        }
    }

    pub fn as_span(&self) -> Option<DateSpan> {
        match self {
            Self::Span(s) => Some(*s),
            Self::Day(_) => None,
        }
    }
}

/// Month number for a Spanish month name (case-insensitive).
pub fn month_number(name: &str) -> Option<u32> {
    let month = match name.trim().to_lowercase().as_str() {
        "enero" => 1,
        "febrero" => 2,
        "marzo" => 3,
        "abril" => 4,
        "mayo" => 5,
        "junio" => 6,
        "julio" => 7,
        "agosto" => 8,
        "septiembre" | "setiembre" => 9,
        "octubre" => 10,
        "noviembre" => 11,
        "diciembre" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parses `DD/MM/YYYY` or `DD de <mes>[ al DD de <mes>][ [de] YYYY]`.
///
/// Dates without a year take `today`'s year. A span whose end month comes
/// before its start month ends in the following year.
pub fn normalize_date(text: &str, today: NaiveDate) -> Option<DateValue> {
    if let Some(re) = cached(&NUMERIC_DATE_RE, r"(\d{1,2})/(\d{1,2})/(\d{4})") {
        if let Some(caps) = re.captures(text) {
            let day = caps[1].parse().ok()?;
            let month = caps[2].parse().ok()?;
            let year = caps[3].parse().ok()?;
            return NaiveDate::from_ymd_opt(year, month, day).map(DateValue::Day);
        }
    }

    let re = cached(
        &SPAN_DATE_RE,
        r"(?i)(\d{1,2})\s+de\s+([a-záéíóú]+)(?:\s+al\s+(\d{1,2})\s+de\s+([a-záéíóú]+))?(?:\s+(?:de\s+)?(\d{4}))?",
    )?;
    let caps = re.captures(text)?;
    let start_day: u32 = caps[1].parse().ok()?;
    let start_month = month_number(&caps[2])?;
    let year = match caps.get(5) {
        Some(y) => y.as_str().parse().ok()?,
        None => today.year(),
    };

    match (caps.get(3), caps.get(4)) {
        (Some(end_day), Some(end_month)) => {
            let end_day: u32 = end_day.as_str().parse().ok()?;
            let end_month = month_number(end_month.as_str())?;
            // A trailing year belongs to the end of the span.
            let (start_year, end_year) = match (caps.get(5), end_month < start_month) {
                (Some(_), true) => (year - 1, year),
                (None, true) => (year, year + 1),
                (_, false) => (year, year),
            };
            let start = NaiveDate::from_ymd_opt(start_year, start_month, start_day)?;
            let end = NaiveDate::from_ymd_opt(end_year, end_month, end_day)?;
            Some(DateValue::Span(DateSpan { start, end }))
        }
        _ => NaiveDate::from_ymd_opt(year, start_month, start_day).map(DateValue::Day),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_quantity_with_comma_and_split_unit() {
        assert!(approx(normalize_quantity("104,4 \n GB").unwrap(), 104.4));
    }

    #[test]
    fn test_quantity_plain_gigabytes() {
        assert_eq!(normalize_quantity("250 GB"), Some(250.0));
    }

    #[test]
    fn test_quantity_rejects_junk() {
        assert_eq!(normalize_quantity("junk"), None);
        assert_eq!(normalize_quantity(""), None);
    }

    #[test]
    fn test_quantity_unit_conversion() {
        assert_eq!(normalize_quantity("2 TB"), Some(2048.0));
        assert_eq!(normalize_quantity("512 MB"), Some(0.5));
        assert_eq!(normalize_quantity("1048576 kb"), Some(1.0));
    }

    #[test]
    fn test_quantity_without_unit_defaults_to_gigabytes() {
        assert!(approx(normalize_quantity("145,6").unwrap(), 145.6));
    }

    #[test]
    fn test_quantity_inside_label_text() {
        let text = "Consumidos \n 104,4 \n GB";
        assert!(approx(normalize_quantity(text).unwrap(), 104.4));
    }

    #[test]
    fn test_locale_numbers_with_grouping() {
        assert_eq!(parse_locale_number("1.024,5"), Some(1024.5));
        assert_eq!(parse_locale_number("1,024.5"), Some(1024.5));
        assert_eq!(parse_locale_number("1.000.000"), Some(1_000_000.0));
        assert_eq!(parse_locale_number("250."), Some(250.0));
        assert_eq!(parse_locale_number(","), None);
    }

    #[test]
    fn test_find_quantities_in_document_order() {
        let found = find_quantities("Me quedan 145,6 GB de 250\nGB y 300 MB extra");
        let values: Vec<f64> = found.iter().map(|(v, _)| *v).collect();
        assert_eq!(values.len(), 3);
        assert!(approx(values[0], 145.6));
        assert!(approx(values[1], 250.0));
        assert!(approx(values[2], 300.0 / 1024.0));
        assert_eq!(found[1].1, "250 GB");
    }

    #[test]
    fn test_numeric_date() {
        let today = ymd(2026, 1, 10);
        assert_eq!(
            normalize_date("Fin de contrato: 26/11/2027", today),
            Some(DateValue::Day(ymd(2027, 11, 26)))
        );
    }

    #[test]
    fn test_numeric_date_out_of_range_is_none() {
        assert_eq!(normalize_date("31/02/2027", ymd(2026, 1, 1)), None);
    }

    #[test]
    fn test_span_within_one_month() {
        let today = ymd(2026, 1, 10);
        let span = normalize_date("1 de enero al 31 de enero", today)
            .unwrap()
            .as_span()
            .unwrap();
        assert_eq!(span.start, ymd(2026, 1, 1));
        assert_eq!(span.end, ymd(2026, 1, 31));
    }

    #[test]
    fn test_span_wrapping_the_year() {
        let today = ymd(2025, 12, 30);
        let span = normalize_date("28 de diciembre al 3 de enero", today)
            .unwrap()
            .as_span()
            .unwrap();
        assert_eq!(span.start, ymd(2025, 12, 28));
        assert_eq!(span.end, ymd(2026, 1, 3));
    }

    #[test]
    fn test_single_day_with_year() {
        let today = ymd(2025, 12, 1);
        assert_eq!(
            normalize_date("Vence el 15 de febrero 2026", today),
            Some(DateValue::Day(ymd(2026, 2, 15)))
        );
        assert_eq!(
            normalize_date("15 de Setiembre", today),
            Some(DateValue::Day(ymd(2025, 9, 15)))
        );
    }

    #[test]
    fn test_unknown_month_is_none() {
        let today = ymd(2026, 1, 1);
        assert_eq!(normalize_date("1 de brumario al 3 de enero", today), None);
        assert_eq!(normalize_date("sin fecha", today), None);
    }

    #[test]
    fn test_collapse_whitespace_joins_lines() {
        assert_eq!(
            collapse_whitespace("  Ciclo actual:\n   1 de enero \t al 31 de enero "),
            "Ciclo actual: 1 de enero al 31 de enero"
        );
    }
}
