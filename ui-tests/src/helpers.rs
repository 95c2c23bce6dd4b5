//! Text and date utilities shared by the page objects and scenarios.

use jiff::ToSpan;
use jiff::civil::Date;
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
    #[error("Unrecognized Invoice Date format: {0:?}")]
    UnrecognizedInvoiceDate(String),
    #[error(
        "could not parse Total Record Count from {0:?}, expected text like 'Total Record Count 123'"
    )]
    MissingRecordCount(String),
    #[error("Total Record Count {0} does not fit in a 64-bit counter")]
    RecordCountOutOfRange(String),
    #[error("expected a non-negative integer counter, got {0:?}")]
    InvalidCounter(String),
}

static RECORD_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Total Record Count\s+(\d+)").expect("valid regex")
});

static US_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("valid regex"));

/// Invoice date renderings seen in the results table, most specific first.
const INVOICE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%b. %d, %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

pub fn parse_total_record_count(text: &str) -> Result<u64, ParseError> {
    let caps = RECORD_COUNT
        .captures(text)
        .ok_or_else(|| ParseError::MissingRecordCount(text.trim().to_string()))?;
    // Only digits are captured, so overflow is the one way parsing fails
    caps[1]
        .parse()
        .map_err(|_| ParseError::RecordCountOutOfRange(caps[1].to_string()))
}

pub fn parse_invoice_date(text: &str) -> Result<Date, ParseError> {
    let text = text.trim();
    for format in INVOICE_DATE_FORMATS {
        let Ok(date) = Date::strptime(format, text) else {
            continue;
        };
        // two-digit years belong to %y
        if format.contains("%Y") && date.year() < 1000 {
            continue;
        }
        return Ok(date);
    }
    Err(ParseError::UnrecognizedInvoiceDate(text.to_string()))
}

/// Prefix of `base` with `len` characters where letters alternate between
/// lower and upper case, counting only letters. Everything else is kept.
///
/// `alternating_case_prefix("Honeywell", 4)` is `"hOnE"`.
pub fn alternating_case_prefix(base: &str, len: usize) -> String {
    let mut alpha_index = 0;
    let mut out = String::with_capacity(base.len());
    for ch in base.chars().take(len) {
        if ch.is_alphabetic() {
            if alpha_index % 2 == 0 {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            alpha_index += 1;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Dashboard counters render as bare digits.
pub fn parse_counter(text: &str) -> Result<u64, ParseError> {
    let trimmed = text.trim();
    if !is_record_id(trimmed) {
        return Err(ParseError::InvalidCounter(trimmed.to_string()));
    }
    trimmed
        .parse()
        .map_err(|_| ParseError::InvalidCounter(trimmed.to_string()))
}

/// mm/dd/yyyy
pub fn is_us_date(text: &str) -> bool {
    US_DATE.is_match(text.trim())
}

pub fn is_record_id(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// File stem for the artifacts of a failed test.
pub fn artifact_name(test_path: &str) -> String {
    test_path.replace(['/', '\\'], "_").replace("::", "__")
}

/// Quote `text` as an XPath string literal.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        let parts: Vec<String> = text
            .split('\'')
            .map(|part| format!("'{part}'"))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// XPath predicate matching elements that carry every class in `classes`.
pub fn xpath_has_classes(classes: &[&str]) -> String {
    classes
        .iter()
        .map(|class| {
            format!(
                "contains(concat(' ', normalize-space(@class), ' '), ' {class} ')"
            )
        })
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Inclusive `[today - days, today]` window used by the "Last N Days"
/// invoice date options.
pub fn date_window(today: Date, days: i64) -> anyhow::Result<(Date, Date)> {
    let start = today.checked_sub(days.days())?;
    Ok((start, today))
}
