//! Extract the embedded address-count history from inline chart script.
//!
//! The page feeds its chart with array literals of the form
//! `[new Date("2026/02/27"),325637,1071124,...]`, one per day, oldest first.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::types::{ParseError, TierCounts, DATE_FORMAT, TIER_COUNT};

/// One parsed day of the history series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub counts: TierCounts,
}

fn series_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\[new Date\("(.*?)"\),(.*?)\]"#).expect("series regex is valid"))
}

/// Extract every history row in document order.
///
/// Rows are not re-sorted; the page lists them chronologically. Returns
/// [`ParseError::NoHistoryData`] when the pattern matches nothing.
pub fn parse_history(html: &str) -> Result<Vec<HistoryRow>, ParseError> {
    let mut rows = Vec::new();

    for caps in series_regex().captures_iter(html) {
        let raw_date = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let tail = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        let date = parse_date(raw_date)?;
        let counts = parse_counts(tail, raw_date)?;
        rows.push(HistoryRow { date, counts });
    }

    if rows.is_empty() {
        return Err(ParseError::NoHistoryData);
    }

    tracing::debug!("parsed {} history rows", rows.len());
    Ok(rows)
}

/// Normalize `2026/02/27` to a date.
fn parse_date(raw: &str) -> Result<NaiveDate, ParseError> {
    let normalized = raw.trim().replace('/', "-");
    NaiveDate::parse_from_str(&normalized, DATE_FORMAT).map_err(|_| ParseError::InvalidDate {
        raw: raw.to_string(),
    })
}

/// Split the numeric tail into exactly eight counts, zero-padding short rows.
fn parse_counts(tail: &str, raw_date: &str) -> Result<TierCounts, ParseError> {
    let mut counts = [0u64; TIER_COUNT];
    for (slot, token) in counts.iter_mut().zip(tail.split(',')) {
        let token = token.trim();
        if token.is_empty() || token == "null" {
            continue;
        }
        *slot = token.parse::<u64>().map_err(|_| ParseError::InvalidCount {
            date: raw_date.to_string(),
            token: token.to_string(),
        })?;
    }
    Ok(counts)
}
