// Value cleaning for free-text report columns.
//
// Both functions are total: bad numbers become 0.0, bad dates become None.

use chrono::{NaiveDate, NaiveDateTime};

/// Suffix appended to two-digit month labels ("03월").
pub const MONTH_SUFFIX: &str = "월";

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d-%b-%Y",
];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%b %d, %Y %I:%M:%S %p",
];

/// Parse a numeric cell that may carry thousands separators.
///
/// Returns 0.0 for anything that is not a finite number.
pub fn coerce_number(raw: &str) -> f64 {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

pub fn coerce_numbers<'a, I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a str>,
{
    values.into_iter().map(coerce_number).collect()
}

/// Parse a date cell in any of the layouts the stores export.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    // Trailing zone names ("PST", "UTC") are not parseable by chrono; drop them.
    let without_zone = match value.rsplit_once(' ') {
        Some((head, tail)) if tail.chars().all(|c| c.is_ascii_alphabetic()) && tail.len() <= 4 => {
            head
        }
        _ => value,
    };
    for candidate in [value, without_zone] {
        for format in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(candidate, format) {
                return Some(dt.date());
            }
        }
    }

    None
}

pub fn parse_dates<'a, I>(values: I) -> Vec<Option<NaiveDate>>
where
    I: IntoIterator<Item = &'a str>,
{
    values.into_iter().map(parse_date).collect()
}

/// Distinct "MM월" labels of the present dates, sorted.
pub fn month_labels<I>(dates: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<NaiveDate>>,
{
    let mut labels: Vec<String> = dates
        .into_iter()
        .flatten()
        .map(|d| format!("{}{}", d.format("%m"), MONTH_SUFFIX))
        .collect();
    labels.sort();
    labels.dedup();
    labels
}

/// Earliest and latest present date.
pub fn date_span<I>(dates: I) -> Option<(NaiveDate, NaiveDate)>
where
    I: IntoIterator<Item = Option<NaiveDate>>,
{
    dates.into_iter().flatten().fold(None, |span, d| match span {
        None => Some((d, d)),
        Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
    })
}
