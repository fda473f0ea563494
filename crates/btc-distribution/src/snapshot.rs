//! Parse the current per-tier coin/fiat distribution table.
//!
//! The table is identified by its class attribute. Each data row carries
//! the tier label in the first cell and the coin and USD totals in the
//! fourth and fifth cells. Anything that does not fit degrades to a
//! [`SnapshotWarning`] instead of failing the run: the history series is
//! useful without the snapshot.

use std::collections::BTreeMap;
use std::fmt;

use scraper::{ElementRef, Html, Selector};

use crate::types::{normalize_label, BalanceTier, TierValue};

/// CSS selector of the distribution table.
pub const SNAPSHOT_TABLE_SELECTOR: &str = "table.table-condensed";

/// Minimum number of `<td>` cells in a usable data row.
const MIN_CELLS: usize = 5;
const COINS_CELL: usize = 3;
const USD_CELL: usize = 4;

/// Non-fatal problems found while reading the snapshot table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotWarning {
    /// No element matched [`SNAPSHOT_TABLE_SELECTOR`].
    TableMissing,
    /// A data row had fewer than five cells.
    ShortRow { row: usize, cells: usize },
    /// A row label did not normalize to a known tier.
    UnknownTier { label: String },
    /// A coin or fiat cell had no numeric content.
    MalformedValue { tier: BalanceTier, cell: String },
}

impl fmt::Display for SnapshotWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotWarning::TableMissing => {
                write!(f, "snapshot table not found; coin/usd values unavailable")
            }
            SnapshotWarning::ShortRow { row, cells } => {
                write!(f, "snapshot row {row} has {cells} cells, expected at least {MIN_CELLS}")
            }
            SnapshotWarning::UnknownTier { label } => {
                write!(f, "snapshot row label {label:?} is not a tracked tier")
            }
            SnapshotWarning::MalformedValue { tier, cell } => {
                write!(f, "snapshot value {cell:?} for tier {tier} is not numeric")
            }
        }
    }
}

/// Result of reading the snapshot table.
#[derive(Debug, Clone, Default)]
pub struct SnapshotParse {
    pub values: BTreeMap<BalanceTier, TierValue>,
    pub warnings: Vec<SnapshotWarning>,
}

impl SnapshotParse {
    /// Whether every tracked tier was found.
    pub fn is_complete(&self) -> bool {
        self.values.len() == BalanceTier::ALL.len()
    }
}

/// Extract the per-tier coin and USD totals from the page.
pub fn parse_snapshot(html: &str) -> SnapshotParse {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse(SNAPSHOT_TABLE_SELECTOR).expect("table selector is valid");
    let row_sel = Selector::parse("tr").expect("row selector is valid");
    let cell_sel = Selector::parse("td").expect("cell selector is valid");

    let mut result = SnapshotParse::default();

    let Some(table) = document.select(&table_sel).next() else {
        result.warnings.push(SnapshotWarning::TableMissing);
        return result;
    };

    for (row_idx, row) in table.select(&row_sel).enumerate() {
        let cells: Vec<String> = row.select(&cell_sel).map(|c| cell_text(&c)).collect();

        // Header rows use <th>.
        if cells.is_empty() {
            continue;
        }
        if cells.len() < MIN_CELLS {
            result.warnings.push(SnapshotWarning::ShortRow {
                row: row_idx,
                cells: cells.len(),
            });
            continue;
        }

        let Some(tier) = BalanceTier::from_label(&cells[0]) else {
            tracing::debug!("skipping snapshot row {:?}", normalize_label(&cells[0]));
            result.warnings.push(SnapshotWarning::UnknownTier {
                label: cells[0].clone(),
            });
            continue;
        };

        let Some(coins) = parse_coin_amount(&cells[COINS_CELL]) else {
            result.warnings.push(SnapshotWarning::MalformedValue {
                tier,
                cell: cells[COINS_CELL].clone(),
            });
            continue;
        };
        let Some(usd) = parse_fiat_amount(&cells[USD_CELL]) else {
            result.warnings.push(SnapshotWarning::MalformedValue {
                tier,
                cell: cells[USD_CELL].clone(),
            });
            continue;
        };

        result
            .values
            .entry(tier)
            .or_insert_with(|| TierValue::new(coins, usd));
    }

    result
}

/// Parse a coin cell such as `"12,345.67 BTC (3.2%)"` into `"12345.67"`.
pub fn parse_coin_amount(text: &str) -> Option<String> {
    leading_number(text.trim_start())
}

/// Parse a fiat cell such as `"$1,234,567 USD"` into `"1234567"`.
pub fn parse_fiat_amount(text: &str) -> Option<String> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | '\u{20AC}' | '\u{00A3}' | '\u{00A5}'))
        .collect();
    leading_number(cleaned.trim_start())
}

/// Take the leading run of digits, separators and decimal point, dropping
/// the thousands separators.
fn leading_number(text: &str) -> Option<String> {
    let number: String = text
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();
    let number = number.trim_end_matches('.');
    if number.is_empty() || number.parse::<f64>().is_err() {
        return None;
    }
    Some(number.to_string())
}

fn cell_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
