//! Reconcile freshly built points with the persisted dataset.
//!
//! The dataset only grows: fresh points are appended when their date is
//! strictly after the latest persisted date. Earlier and equal dates are
//! dropped, except that [`SameDatePolicy::OverwriteLast`] lets a same-day
//! re-fetch replace the latest point. That replacement also applies when the
//! same batch appends newer dates; the replaced point then loses its snapshot
//! like every other non-latest point.

use std::fmt;
use std::str::FromStr;

use crate::types::{Dataset, HistoryPoint};

/// What to do when a fresh point has the same date as the latest persisted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameDatePolicy {
    /// Keep the persisted point untouched.
    #[default]
    Skip,
    /// Replace the persisted latest point with the fresh one.
    OverwriteLast,
}

impl FromStr for SameDatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "overwrite" | "overwrite-last" => Ok(Self::OverwriteLast),
            other => Err(format!("unknown same-day policy: {other} (expected skip or overwrite)")),
        }
    }
}

impl fmt::Display for SameDatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => f.write_str("skip"),
            Self::OverwriteLast => f.write_str("overwrite"),
        }
    }
}

/// Result of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No dataset existed; the fresh points became the dataset.
    Created { dataset: Dataset, added: usize },
    /// Points newer than the persisted latest date were appended.
    Appended { dataset: Dataset, added: usize },
    /// The latest persisted point was replaced by a same-day re-fetch.
    Refreshed { dataset: Dataset },
    /// Nothing newer than the persisted data; leave the files alone.
    NoOp { dataset: Dataset },
}

impl MergeOutcome {
    pub fn dataset(&self) -> &Dataset {
        match self {
            MergeOutcome::Created { dataset, .. }
            | MergeOutcome::Appended { dataset, .. }
            | MergeOutcome::Refreshed { dataset }
            | MergeOutcome::NoOp { dataset } => dataset,
        }
    }

    pub fn into_dataset(self) -> Dataset {
        match self {
            MergeOutcome::Created { dataset, .. }
            | MergeOutcome::Appended { dataset, .. }
            | MergeOutcome::Refreshed { dataset }
            | MergeOutcome::NoOp { dataset } => dataset,
        }
    }

    /// Number of new dates added to the dataset.
    pub fn added(&self) -> usize {
        match self {
            MergeOutcome::Created { added, .. } | MergeOutcome::Appended { added, .. } => *added,
            MergeOutcome::Refreshed { .. } | MergeOutcome::NoOp { .. } => 0,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, MergeOutcome::NoOp { .. })
    }

    /// Whether the persisted files must be rewritten.
    pub fn requires_write(&self) -> bool {
        !self.is_noop()
    }
}

/// Merge `fresh` into `prior`.
///
/// Only the latest point of the result keeps snapshot values; earlier
/// points are reset to the sentinel.
pub fn merge(prior: Option<Dataset>, fresh: Vec<HistoryPoint>, policy: SameDatePolicy) -> MergeOutcome {
    let Some(prior) = prior else {
        let mut dataset = Dataset::from_points(fresh);
        dataset.demote_stale_snapshots();
        let added = dataset.len();
        return MergeOutcome::Created { dataset, added };
    };

    let latest = prior.latest_date();
    let mut same_day: Option<HistoryPoint> = None;
    let mut newer: Vec<HistoryPoint> = Vec::new();

    for point in fresh {
        match latest {
            Some(l) if point.date < l => {}
            Some(l) if point.date == l => same_day = Some(point),
            _ => newer.push(point),
        }
    }

    let refresh = match (policy, same_day) {
        (SameDatePolicy::OverwriteLast, Some(mut point)) => {
            if let Some(stored) = prior.last() {
                // A re-fetch without a usable table keeps the stored values.
                if point.snapshot.is_sentinel() {
                    point.snapshot = stored.snapshot.clone();
                }
            }
            (prior.last() != Some(&point)).then_some(point)
        }
        _ => None,
    };

    let before = prior.len();
    let mut dataset = prior;
    let refreshed = match refresh {
        Some(point) => match dataset.last_mut() {
            Some(last) => {
                *last = point;
                true
            }
            None => false,
        },
        None => false,
    };

    if !newer.is_empty() {
        // A same-day refresh still lands here; its snapshot is demoted below.
        let mut points = dataset.into_points();
        points.extend(newer);
        let mut dataset = Dataset::from_points(points);
        dataset.demote_stale_snapshots();
        let added = dataset.len() - before;
        tracing::debug!("appending {added} points after {latest:?}");
        return MergeOutcome::Appended { dataset, added };
    }

    if refreshed {
        MergeOutcome::Refreshed { dataset }
    } else {
        MergeOutcome::NoOp { dataset }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BalanceTier, SnapshotValue, TierValue};
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn snap(coins: &str) -> SnapshotValue {
        let mut s = SnapshotValue::sentinel();
        s.set(BalanceTier::UpToTenth, TierValue::new(coins, "100"));
        s
    }

    fn point(date: &str, n: u64) -> HistoryPoint {
        HistoryPoint::new(d(date), [n; 8])
    }

    fn prior() -> Dataset {
        Dataset::from_points(vec![
            point("2026-02-24", 1),
            point("2026-02-25", 2),
            point("2026-02-26", 3).with_snapshot(snap("5")),
        ])
    }

    #[test]
    fn test_first_run_creates_dataset() {
        let fresh = vec![point("2026-02-25", 1), point("2026-02-26", 2)];
        let outcome = merge(None, fresh, SameDatePolicy::Skip);
        assert!(matches!(outcome, MergeOutcome::Created { added: 2, .. }));
        assert_eq!(outcome.dataset().len(), 2);
        assert!(outcome.requires_write());
    }

    #[test]
    fn test_appends_only_strictly_newer() {
        let fresh = vec![
            point("2026-02-25", 9),
            point("2026-02-26", 9),
            point("2026-02-27", 4).with_snapshot(snap("7")),
        ];
        let outcome = merge(Some(prior()), fresh, SameDatePolicy::Skip);

        assert_eq!(outcome.added(), 1);
        let dataset = outcome.dataset();
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.latest_date(), Some(d("2026-02-27")));
        // Prior rows are kept as persisted.
        assert_eq!(dataset.points()[1].counts, [2; 8]);
        assert_eq!(dataset.points()[2].counts, [3; 8]);
    }

    #[test]
    fn test_only_latest_keeps_snapshot_after_append() {
        let fresh = vec![point("2026-02-27", 4).with_snapshot(snap("7"))];
        let outcome = merge(Some(prior()), fresh, SameDatePolicy::Skip);
        let points = outcome.dataset().points();
        for p in &points[..points.len() - 1] {
            assert!(p.snapshot.is_sentinel());
        }
        assert_eq!(
            points.last().unwrap().snapshot.get(BalanceTier::UpToTenth).coins,
            "7"
        );
    }

    #[test]
    fn test_no_newer_points_is_noop() {
        let fresh = vec![point("2026-02-25", 9), point("2026-02-26", 9)];
        let outcome = merge(Some(prior()), fresh, SameDatePolicy::Skip);
        assert!(outcome.is_noop());
        assert_eq!(outcome.added(), 0);
        assert_eq!(outcome.into_dataset(), prior());
    }

    #[test]
    fn test_same_day_overwrite() {
        let fresh = vec![point("2026-02-26", 8).with_snapshot(snap("9"))];
        let outcome = merge(Some(prior()), fresh, SameDatePolicy::OverwriteLast);
        let MergeOutcome::Refreshed { dataset } = outcome else {
            panic!("expected refresh");
        };
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.last().unwrap().counts, [8; 8]);
        assert_eq!(dataset.last().unwrap().snapshot.get(BalanceTier::UpToTenth).coins, "9");
    }

    #[test]
    fn test_same_day_overwrite_keeps_stored_snapshot_when_table_missing() {
        let fresh = vec![point("2026-02-26", 8)];
        let outcome = merge(Some(prior()), fresh, SameDatePolicy::OverwriteLast);
        let MergeOutcome::Refreshed { dataset } = outcome else {
            panic!("expected refresh");
        };
        let last = dataset.last().unwrap();
        assert_eq!(last.counts, [8; 8]);
        assert_eq!(last.snapshot.get(BalanceTier::UpToTenth).coins, "5");
    }

    #[test]
    fn test_same_day_sentinel_refetch_with_same_counts_is_noop() {
        let fresh = vec![point("2026-02-26", 3)];
        let outcome = merge(Some(prior()), fresh, SameDatePolicy::OverwriteLast);
        assert!(outcome.is_noop());
    }

    #[test]
    fn test_same_day_overwrite_applies_alongside_append() {
        let fresh = vec![point("2026-02-26", 8), point("2026-02-27", 4).with_snapshot(snap("7"))];
        let outcome = merge(Some(prior()), fresh, SameDatePolicy::OverwriteLast);
        assert_eq!(outcome.added(), 1);
        let points = outcome.dataset().points();
        assert_eq!(points[2].counts, [8; 8]);
        assert!(points[2].snapshot.is_sentinel());
        assert_eq!(points[3].snapshot.get(BalanceTier::UpToTenth).coins, "7");
    }

    #[test]
    fn test_same_day_skip_alongside_append_keeps_stored_counts() {
        let fresh = vec![point("2026-02-26", 8), point("2026-02-27", 4)];
        let outcome = merge(Some(prior()), fresh, SameDatePolicy::Skip);
        assert_eq!(outcome.dataset().points()[2].counts, [3; 8]);
    }

    #[test]
    fn test_same_day_identical_is_noop() {
        let fresh = vec![point("2026-02-26", 3).with_snapshot(snap("5"))];
        let outcome = merge(Some(prior()), fresh, SameDatePolicy::OverwriteLast);
        assert!(outcome.is_noop());
    }

    #[test]
    fn test_out_of_order_fresh_is_sorted() {
        let fresh = vec![point("2026-03-01", 6), point("2026-02-28", 5), point("2026-02-27", 4)];
        let outcome = merge(Some(prior()), fresh, SameDatePolicy::Skip);
        assert_eq!(outcome.added(), 3);
        let dates: Vec<NaiveDate> = outcome.dataset().points().iter().map(|p| p.date).collect();
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_empty_prior_takes_everything() {
        let fresh = vec![point("2026-02-27", 4)];
        let outcome = merge(Some(Dataset::new()), fresh, SameDatePolicy::Skip);
        assert!(matches!(outcome, MergeOutcome::Appended { added: 1, .. }));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("skip".parse::<SameDatePolicy>(), Ok(SameDatePolicy::Skip));
        assert_eq!("Overwrite".parse::<SameDatePolicy>(), Ok(SameDatePolicy::OverwriteLast));
        assert!("replace".parse::<SameDatePolicy>().is_err());
    }
}
