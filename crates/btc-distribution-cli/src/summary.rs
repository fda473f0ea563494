//! Text preview of a persisted dataset.

use std::fmt::Write;

use btc_distribution::{BalanceTier, Dataset};

/// Render the dataset size, date range and its last `rows` points.
pub fn render_summary(dataset: &Dataset, rows: usize) -> String {
    let mut out = String::new();

    let (Some(first), Some(last)) = (dataset.first_date(), dataset.latest_date()) else {
        out.push_str("Dataset is empty\n");
        return out;
    };

    let _ = writeln!(out, "Records:    {}", dataset.len());
    let _ = writeln!(out, "First date: {first}");
    let _ = writeln!(out, "Last date:  {last}");

    let tail = dataset.tail(rows);
    if tail.is_empty() {
        return out;
    }

    out.push('\n');
    let _ = write!(out, "{:<10}", "Date");
    for tier in BalanceTier::ALL {
        let _ = write!(out, " {:>18}", tier.key());
    }
    out.push('\n');

    for point in tail {
        let _ = write!(out, "{:<10}", point.date_string());
        for count in point.counts {
            let _ = write!(out, " {count:>18}");
        }
        out.push('\n');
    }

    if let Some(latest) = dataset.last().filter(|p| !p.snapshot.is_sentinel()) {
        let _ = writeln!(out, "\nSnapshot as of {}:", latest.date_string());
        for tier in BalanceTier::ALL {
            let value = latest.snapshot.get(tier);
            let _ = writeln!(out, "  {:<18} {:>16} BTC  {:>18} USD", tier.key(), value.coins, value.usd);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use btc_distribution::{HistoryPoint, SnapshotValue, TierValue};
    use chrono::NaiveDate;

    fn point(day: u32) -> HistoryPoint {
        HistoryPoint::new(NaiveDate::from_ymd_opt(2026, 2, day).unwrap(), [u64::from(day); 8])
    }

    #[test]
    fn test_empty_dataset() {
        assert_eq!(render_summary(&Dataset::new(), 5), "Dataset is empty\n");
    }

    #[test]
    fn test_tail_rows_only() {
        let dataset = Dataset::from_points((1..=9).map(point).collect());
        let text = render_summary(&dataset, 3);
        assert!(text.contains("Records:    9"));
        assert!(text.contains("First date: 2026-02-01"));
        assert!(text.contains("2026-02-09"));
        assert!(text.contains("2026-02-07"));
        assert!(!text.contains("2026-02-06"));
        assert!(!text.contains("Snapshot as of"));
    }

    #[test]
    fn test_snapshot_section() {
        let mut snapshot = SnapshotValue::sentinel();
        snapshot.set(BalanceTier::OneToTen, TierValue::new("2043676", "122620560000"));
        let dataset = Dataset::from_points(vec![point(1), point(2).with_snapshot(snapshot)]);
        let text = render_summary(&dataset, 5);
        assert!(text.contains("Snapshot as of 2026-02-02:"));
        assert!(text.contains("122620560000"));
    }
}
