//! Parsing and merge tests against saved copies of the distribution page.

use btc_distribution::{
    build_points, merge, parse_history, parse_snapshot, BalanceTier, Dataset, DatasetStore,
    MergeOutcome, ParseError, SameDatePolicy, SnapshotWarning,
};
use chrono::NaiveDate;

const GOOD_PAGE: &str = include_str!("fixtures/distribution_page.html");
const DRIFTED_PAGE: &str = include_str!("fixtures/drifted_page.html");
const NO_TABLE_PAGE: &str = include_str!("fixtures/no_table_page.html");

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn build(html: &str) -> Vec<btc_distribution::HistoryPoint> {
    let rows = parse_history(html).unwrap();
    let snapshot = parse_snapshot(html);
    build_points(rows, &snapshot.values)
}

#[test]
fn test_good_page_history() {
    let rows = parse_history(GOOD_PAGE).unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].date, d("2026-02-24"));
    assert_eq!(rows[3].date, d("2026-02-27"));
    assert_eq!(rows[3].counts, [45612333, 3401245, 865402, 131220, 15907, 1935, 83, 4]);
}

#[test]
fn test_good_page_snapshot() {
    let snapshot = parse_snapshot(GOOD_PAGE);
    assert!(snapshot.warnings.is_empty(), "{:?}", snapshot.warnings);
    assert!(snapshot.is_complete());

    let first = &snapshot.values[&BalanceTier::UpToTenth];
    assert_eq!(first.coins, "12345.67");
    assert_eq!(first.usd, "1234567000");

    let thousands = &snapshot.values[&BalanceTier::ThousandToTenThousand];
    assert_eq!(thousands.coins, "4210555.5");
}

#[test]
fn test_point_count_matches_history_matches() {
    let rows = parse_history(GOOD_PAGE).unwrap();
    let points = build(GOOD_PAGE);
    assert_eq!(points.len(), rows.len());

    let (last, earlier) = points.split_last().unwrap();
    assert!(earlier.iter().all(|p| p.snapshot.is_sentinel()));
    assert_eq!(last.snapshot.get(BalanceTier::HundredThousandToMillion).usd, "38127360000");
}

#[test]
fn test_drifted_page_is_structural_error() {
    let err = parse_history(DRIFTED_PAGE).unwrap_err();
    assert!(matches!(err, ParseError::NoHistoryData));
}

#[test]
fn test_missing_table_degrades_to_sentinel() {
    let snapshot = parse_snapshot(NO_TABLE_PAGE);
    assert_eq!(snapshot.warnings, vec![SnapshotWarning::TableMissing]);

    let points = build(NO_TABLE_PAGE);
    assert_eq!(points.len(), 2);
    assert!(points.iter().all(|p| p.snapshot.is_sentinel()));
    // Seven counts on the page; the last tier is padded.
    assert_eq!(points[1].counts[7], 0);
}

#[test]
fn test_rerun_with_same_page_is_noop_and_files_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path());

    let first = merge(store.load().unwrap(), build(GOOD_PAGE), SameDatePolicy::Skip);
    assert!(matches!(first, MergeOutcome::Created { added: 4, .. }));
    store.save(first.dataset()).unwrap();

    let csv_before = std::fs::read(store.csv_path()).unwrap();
    let json_before = std::fs::read(store.json_path()).unwrap();

    let second = merge(store.load().unwrap(), build(GOOD_PAGE), SameDatePolicy::Skip);
    assert!(second.is_noop());
    assert!(!second.requires_write());

    assert_eq!(std::fs::read(store.csv_path()).unwrap(), csv_before);
    assert_eq!(std::fs::read(store.json_path()).unwrap(), json_before);
}

#[test]
fn test_append_after_prior_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path());

    // Prior dataset ends 2026-02-26.
    let prior: Vec<_> = build(GOOD_PAGE)
        .into_iter()
        .filter(|p| p.date <= d("2026-02-26"))
        .collect();
    store.save(&Dataset::from_points(prior)).unwrap();

    let outcome = merge(store.load().unwrap(), build(GOOD_PAGE), SameDatePolicy::Skip);
    assert_eq!(outcome.added(), 1);
    store.save(outcome.dataset()).unwrap();

    let reloaded = store.load().unwrap().unwrap();
    assert_eq!(reloaded.len(), 4);
    assert_eq!(reloaded.latest_date(), Some(d("2026-02-27")));
    let dates: Vec<_> = reloaded.points().iter().map(|p| p.date).collect();
    assert!(dates.windows(2).all(|w| w[0] < w[1]));

    let (last, earlier) = reloaded.points().split_last().unwrap();
    assert!(earlier.iter().all(|p| p.snapshot.is_sentinel()));
    assert_eq!(last.snapshot.get(BalanceTier::UpToTenth).coins, "12345.67");
}

#[test]
fn test_json_output_has_one_record_per_point() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path());
    store.save(&Dataset::from_points(build(GOOD_PAGE))).unwrap();

    let json = std::fs::read_to_string(store.json_path()).unwrap();
    assert!(!json.contains("\\u"));
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 4);
}
