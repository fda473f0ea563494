//! CSV and JSON persistence for the distribution dataset.
//!
//! Both files hold the same rows and are replaced wholesale on every save.
//! The CSV file is the source of truth when loading; the JSON file is an
//! output for front-ends.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::types::{
    column_header, BalanceTier, Dataset, HistoryPoint, StorageError, StorageResult,
    TierValue, DATE_COLUMN, DATE_FORMAT, SENTINEL, TIER_COUNT,
};

/// Row-oriented output file name.
pub const CSV_FILE_NAME: &str = "btc_history_full.csv";

/// Record-oriented output file name.
pub const JSON_FILE_NAME: &str = "data.json";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// The pair of dataset files inside one data directory.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    dir: PathBuf,
}

impl DatasetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn csv_path(&self) -> PathBuf {
        self.dir.join(CSV_FILE_NAME)
    }

    pub fn json_path(&self) -> PathBuf {
        self.dir.join(JSON_FILE_NAME)
    }

    /// Load the persisted dataset, or `None` if nothing has been written yet.
    pub fn load(&self) -> StorageResult<Option<Dataset>> {
        let path = self.csv_path();
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path)?;
        let dataset = read_csv(file)?;
        tracing::debug!("loaded {} rows from {}", dataset.len(), path.display());
        Ok(Some(dataset))
    }

    /// Replace both files with `dataset`, creating the directory if needed.
    ///
    /// Both files are staged as `.tmp` siblings before either is moved into
    /// place. The CSV is moved last, so a failed save never leaves a CSV
    /// that is newer than the JSON.
    pub fn save(&self, dataset: &Dataset) -> StorageResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let csv_path = self.csv_path();
        let json_path = self.json_path();
        let csv_tmp = tmp_path(&csv_path);
        let json_tmp = tmp_path(&json_path);

        let staged = write_file(&csv_tmp, |w| write_csv(dataset, w))
            .and_then(|()| write_file(&json_tmp, |w| write_json(dataset, w)))
            .and_then(|()| Ok(std::fs::rename(&json_tmp, &json_path)?))
            .and_then(|()| Ok(std::fs::rename(&csv_tmp, &csv_path)?));
        if let Err(e) = staged {
            discard(&[csv_tmp.as_path(), json_tmp.as_path()]);
            return Err(e);
        }

        tracing::debug!("saved {} rows to {}", dataset.len(), self.dir.display());
        Ok(())
    }

    /// Rewrite the JSON file when it is missing or differs from `dataset`.
    ///
    /// Returns whether the file was written.
    pub fn sync_json(&self, dataset: &Dataset) -> StorageResult<bool> {
        let mut expected = Vec::new();
        write_json(dataset, &mut expected)?;

        let path = self.json_path();
        match std::fs::read(&path) {
            Ok(current) if current == expected => return Ok(false),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        std::fs::create_dir_all(&self.dir)?;
        let tmp = tmp_path(&path);
        let staged = write_file(&tmp, |w| Ok(w.write_all(&expected)?))
            .and_then(|()| Ok(std::fs::rename(&tmp, &path)?));
        if let Err(e) = staged {
            discard(&[tmp.as_path()]);
            return Err(e);
        }

        tracing::info!("rebuilt {} from the CSV dataset", path.display());
        Ok(true)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_file<F>(path: &Path, write: F) -> StorageResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> StorageResult<()>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write(&mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Best-effort removal of staged temp files after a failed save.
fn discard(paths: &[&Path]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("could not remove {}: {e}", path.display());
            }
        }
    }
}

/// Write the dataset as BOM-prefixed UTF-8 CSV.
pub fn write_csv<W: Write>(dataset: &Dataset, writer: &mut W) -> StorageResult<()> {
    writer.write_all(UTF8_BOM)?;
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(column_header())?;
    for point in dataset.points() {
        csv.write_record(point.to_record())?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the dataset as a JSON array of objects keyed by the CSV header.
pub fn write_json<W: Write>(dataset: &Dataset, writer: &mut W) -> StorageResult<()> {
    serde_json::to_writer(&mut *writer, dataset.points())?;
    Ok(())
}

/// Column positions resolved from a CSV header.
struct ColumnMap {
    date: usize,
    counts: [usize; TIER_COUNT],
    coins: [Option<usize>; TIER_COUNT],
    usd: [Option<usize>; TIER_COUNT],
}

impl ColumnMap {
    fn from_header(header: &csv::StringRecord) -> StorageResult<Self> {
        let find = |name: &str| header.iter().position(|h| h.trim() == name);

        let date = find(DATE_COLUMN).ok_or_else(|| StorageError::Schema {
            message: format!("missing {DATE_COLUMN:?} column"),
        })?;

        let mut counts = [0usize; TIER_COUNT];
        let mut coins = [None; TIER_COUNT];
        let mut usd = [None; TIER_COUNT];
        for tier in BalanceTier::ALL {
            counts[tier.index()] = find(tier.key()).ok_or_else(|| StorageError::Schema {
                message: format!("missing tier column {:?}", tier.key()),
            })?;
            coins[tier.index()] = find(tier.coins_column().as_str());
            usd[tier.index()] = find(tier.usd_column().as_str());
        }

        if coins.iter().chain(usd.iter()).all(Option::is_none) {
            tracing::info!("dataset has no snapshot columns; loading them as unavailable");
        }

        Ok(Self {
            date,
            counts,
            coins,
            usd,
        })
    }

    fn parse_row(&self, record: &csv::StringRecord) -> StorageResult<HistoryPoint> {
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or_default();
        let invalid = |message: String| StorageError::InvalidRow { line, message };

        let raw_date = field(self.date);
        let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT)
            .map_err(|_| invalid(format!("invalid date {raw_date:?}")))?;

        let mut counts = [0u64; TIER_COUNT];
        for tier in BalanceTier::ALL {
            let raw = field(self.counts[tier.index()]);
            counts[tier.index()] = raw
                .parse::<u64>()
                .map_err(|_| invalid(format!("invalid count {raw:?} for tier {tier}")))?;
        }

        let mut point = HistoryPoint::new(date, counts);
        for tier in BalanceTier::ALL {
            let coins = snapshot_field(self.coins[tier.index()].map(field));
            let usd = snapshot_field(self.usd[tier.index()].map(field));
            point.snapshot.set(tier, TierValue::new(coins, usd));
        }
        Ok(point)
    }
}

fn snapshot_field(raw: Option<&str>) -> String {
    match raw {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => SENTINEL.to_string(),
    }
}

/// Read a dataset written by [`write_csv`] or by an older 9-column revision.
pub fn read_csv<R: Read>(mut reader: R) -> StorageResult<Dataset> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Dataset::new());
    }

    let mut csv = csv::ReaderBuilder::new().has_headers(true).from_reader(body);
    let columns = ColumnMap::from_header(csv.headers()?)?;

    let mut points = Vec::new();
    for record in csv.records() {
        points.push(columns.parse_row(&record?)?);
    }

    let read = points.len();
    let dataset = Dataset::from_points(points);
    if dataset.len() != read {
        tracing::warn!(
            "dataset contained {} duplicate dates; kept the last row for each",
            read - dataset.len()
        );
    }
    Ok(dataset)
}
