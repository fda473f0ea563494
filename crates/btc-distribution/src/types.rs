//! Core data types for the address-distribution dataset.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Number of balance tiers tracked by the source page.
pub const TIER_COUNT: usize = 8;

/// Placeholder for snapshot fields that are not available for a date.
pub const SENTINEL: &str = "0";

/// Name of the date column in both output formats.
pub const DATE_COLUMN: &str = "Date";

/// Date format used in the persisted files.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Address-balance range, in BTC. Declaration order is the canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BalanceTier {
    UpToTenth,
    TenthToOne,
    OneToTen,
    TenToHundred,
    HundredToThousand,
    ThousandToTenThousand,
    TenThousandToHundredThousand,
    HundredThousandToMillion,
}

impl BalanceTier {
    /// All tiers in canonical order.
    pub const ALL: [BalanceTier; TIER_COUNT] = [
        BalanceTier::UpToTenth,
        BalanceTier::TenthToOne,
        BalanceTier::OneToTen,
        BalanceTier::TenToHundred,
        BalanceTier::HundredToThousand,
        BalanceTier::ThousandToTenThousand,
        BalanceTier::TenThousandToHundredThousand,
        BalanceTier::HundredThousandToMillion,
    ];

    /// Canonical key, also the address-count column name.
    pub fn key(self) -> &'static str {
        match self {
            BalanceTier::UpToTenth => "0-0.1",
            BalanceTier::TenthToOne => "0.1-1",
            BalanceTier::OneToTen => "1-10",
            BalanceTier::TenToHundred => "10-100",
            BalanceTier::HundredToThousand => "100-1,000",
            BalanceTier::ThousandToTenThousand => "1,000-10,000",
            BalanceTier::TenThousandToHundredThousand => "10,000-100,000",
            BalanceTier::HundredThousandToMillion => "100,000-1,000,000",
        }
    }

    /// Position in canonical order.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn coins_column(self) -> String {
        format!("{}_coins", self.key())
    }

    pub fn usd_column(self) -> String {
        format!("{}_usd", self.key())
    }

    /// Look up a tier by its canonical key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.key() == key)
    }

    /// Look up a tier from a raw table label such as `"[0.1 - 1)"`.
    ///
    /// Brackets, parentheses and whitespace are stripped before matching.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::from_key(&normalize_label(label))
    }
}

impl fmt::Display for BalanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Strip range decoration from a tier label: `"[1,000 - 10,000)"` → `"1,000-10,000"`.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '(' | ')') && !c.is_whitespace())
        .collect()
}

/// Address counts per tier, in canonical order.
pub type TierCounts = [u64; TIER_COUNT];

/// Coin quantity and fiat value held in one tier, as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierValue {
    pub coins: String,
    pub usd: String,
}

impl TierValue {
    pub fn new(coins: impl Into<String>, usd: impl Into<String>) -> Self {
        Self {
            coins: coins.into(),
            usd: usd.into(),
        }
    }

    pub fn sentinel() -> Self {
        Self::new(SENTINEL, SENTINEL)
    }

    pub fn is_sentinel(&self) -> bool {
        self.coins == SENTINEL && self.usd == SENTINEL
    }
}

impl Default for TierValue {
    fn default() -> Self {
        Self::sentinel()
    }
}

/// Per-tier coin/fiat holdings as of the fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnapshotValue {
    tiers: [TierValue; TIER_COUNT],
}

impl SnapshotValue {
    /// All tiers set to the "not available" sentinel.
    pub fn sentinel() -> Self {
        Self::default()
    }

    /// Build from a parsed tier mapping; tiers missing from the map get the sentinel.
    pub fn from_map(values: &BTreeMap<BalanceTier, TierValue>) -> Self {
        let mut snapshot = Self::sentinel();
        for (tier, value) in values {
            snapshot.tiers[tier.index()] = value.clone();
        }
        snapshot
    }

    pub fn get(&self, tier: BalanceTier) -> &TierValue {
        &self.tiers[tier.index()]
    }

    pub fn set(&mut self, tier: BalanceTier, value: TierValue) {
        self.tiers[tier.index()] = value;
    }

    pub fn is_sentinel(&self) -> bool {
        self.tiers.iter().all(TierValue::is_sentinel)
    }
}

/// One calendar date of the distribution history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub counts: TierCounts,
    pub snapshot: SnapshotValue,
}

impl HistoryPoint {
    /// A point without snapshot data.
    pub fn new(date: NaiveDate, counts: TierCounts) -> Self {
        Self {
            date,
            counts,
            snapshot: SnapshotValue::sentinel(),
        }
    }

    pub fn with_snapshot(mut self, snapshot: SnapshotValue) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn count(&self, tier: BalanceTier) -> u64 {
        self.counts[tier.index()]
    }

    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// Field values in header order, as written to the CSV file.
    pub fn to_record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(1 + TIER_COUNT * 3);
        record.push(self.date_string());
        record.extend(self.counts.iter().map(u64::to_string));
        record.extend(BalanceTier::ALL.iter().map(|t| self.snapshot.get(*t).coins.clone()));
        record.extend(BalanceTier::ALL.iter().map(|t| self.snapshot.get(*t).usd.clone()));
        record
    }
}

impl Serialize for HistoryPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1 + TIER_COUNT * 3))?;
        map.serialize_entry(DATE_COLUMN, &self.date_string())?;
        for tier in BalanceTier::ALL {
            map.serialize_entry(tier.key(), &self.count(tier))?;
        }
        for tier in BalanceTier::ALL {
            map.serialize_entry(&tier.coins_column(), &self.snapshot.get(tier).coins)?;
        }
        for tier in BalanceTier::ALL {
            map.serialize_entry(&tier.usd_column(), &self.snapshot.get(tier).usd)?;
        }
        map.end()
    }
}

/// Header tokens shared by the CSV and JSON outputs.
pub fn column_header() -> Vec<String> {
    let mut header = Vec::with_capacity(1 + TIER_COUNT * 3);
    header.push(DATE_COLUMN.to_string());
    header.extend(BalanceTier::ALL.iter().map(|t| t.key().to_string()));
    header.extend(BalanceTier::ALL.iter().map(|t| t.coins_column()));
    header.extend(BalanceTier::ALL.iter().map(|t| t.usd_column()));
    header
}

/// Date-ordered distribution history.
///
/// Dates are strictly increasing; gaps are allowed, duplicates are not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    points: Vec<HistoryPoint>,
}

impl Dataset {
    /// Create an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from points in any order.
    ///
    /// Points are sorted by date; when a date occurs more than once the
    /// occurrence latest in the input wins.
    pub fn from_points(mut points: Vec<HistoryPoint>) -> Self {
        // Stable sort keeps input order within a date.
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<HistoryPoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Self { points: deduped }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[HistoryPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<HistoryPoint> {
        self.points
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn last(&self) -> Option<&HistoryPoint> {
        self.points.last()
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut HistoryPoint> {
        self.points.last_mut()
    }

    /// The most recent `n` points, oldest first.
    pub fn tail(&self, n: usize) -> &[HistoryPoint] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }

    /// Reset the snapshot of every point but the latest to the sentinel.
    pub(crate) fn demote_stale_snapshots(&mut self) {
        let keep = self.points.len().saturating_sub(1);
        for point in &mut self.points[..keep] {
            point.snapshot = SnapshotValue::sentinel();
        }
    }
}

/// Errors raised when the page no longer has the expected structure.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("No history data found; the page structure may have changed")]
    NoHistoryData,

    #[error("Invalid history date: {raw:?}")]
    InvalidDate { raw: String },

    #[error("Invalid address count {token:?} for {date}")]
    InvalidCount { date: String, token: String },
}

/// Errors reading or writing the persisted dataset.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected dataset header: {message}")]
    Schema { message: String },

    #[error("Invalid dataset row at line {line}: {message}")]
    InvalidRow { line: u64, message: String },
}

/// Convenience result type.
pub type StorageResult<T> = Result<T, StorageError>;
