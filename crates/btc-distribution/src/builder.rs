//! Join the parsed history with the current snapshot.

use std::collections::BTreeMap;

use crate::history::HistoryRow;
use crate::types::{BalanceTier, HistoryPoint, SnapshotValue, TierValue};

/// Build one point per history row, in parse order.
///
/// Only the last row by position receives the snapshot values; the page
/// lists its most recent day last. Every other point carries the sentinel.
pub fn build_points(
    rows: Vec<HistoryRow>,
    snapshot: &BTreeMap<BalanceTier, TierValue>,
) -> Vec<HistoryPoint> {
    let last = rows.len().saturating_sub(1);
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            let point = HistoryPoint::new(row.date, row.counts);
            if i == last {
                point.with_snapshot(SnapshotValue::from_map(snapshot))
            } else {
                point
            }
        })
        .collect()
}
