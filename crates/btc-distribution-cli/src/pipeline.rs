//! One tracker run: fetch, parse, merge, write.
//!
//! Files are written only after every parse step has succeeded, so a failed
//! run leaves the persisted dataset as it was.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;

use btc_distribution::{
    build_points, merge, parse_history, parse_snapshot, DatasetStore, MergeOutcome, ParseError,
    SameDatePolicy, StorageError, CSV_FILE_NAME, JSON_FILE_NAME,
};

use crate::config::FetchConfig;
use crate::fetch::{FetchError, PageFetcher};

/// Exit code for a successful run, including one that added nothing.
pub const EXIT_OK: i32 = 0;
/// Exit code when the page could not be retrieved.
pub const EXIT_TRANSPORT: i32 = 1;
/// Exit code when the page no longer has the expected structure.
pub const EXIT_STRUCTURE: i32 = 2;
/// Exit code when the local dataset cannot be read or written.
pub const EXIT_STORAGE: i32 = 3;

/// Errors that abort a run without touching the persisted files.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("Network error: {0}")]
    Transport(#[from] FetchError),

    #[error("Page structure error: {0}")]
    Parse(#[from] ParseError),

    #[error("Dataset error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cannot read input {path}: {source}")]
    Input {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Transport(_) | RunError::Input { .. } => EXIT_TRANSPORT,
            RunError::Parse(_) => EXIT_STRUCTURE,
            RunError::Storage(_) => EXIT_STORAGE,
        }
    }
}

/// Where the page markup comes from.
#[derive(Debug, Clone)]
pub enum PageSource {
    Remote(FetchConfig),
    /// A saved copy of the page.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source: PageSource,
    pub data_dir: PathBuf,
    pub same_day: SameDatePolicy,
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// History rows found on the page.
    pub parsed: usize,
    /// Tiers with snapshot values on the page.
    pub snapshot_tiers: usize,
    pub snapshot_warnings: usize,
    /// Size of the dataset before the run, if one existed.
    pub prior_len: Option<usize>,
    pub prior_latest: Option<NaiveDate>,
    pub added: usize,
    pub refreshed: bool,
    /// Whether either dataset file was written.
    pub written: bool,
    pub total: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prior_len.is_none() {
            writeln!(f, "First run: saved {} records", self.added)?;
        } else if self.added > 0 {
            writeln!(f, "Added {} new records, {} in total", self.added, self.total)?;
        } else if self.refreshed {
            writeln!(f, "Refreshed the latest record")?;
        } else {
            writeln!(f, "No new records to add")?;
        }
        write!(f, "Dataset: {} days", self.total)?;
        if let (Some(first), Some(last)) = (self.first_date, self.last_date) {
            write!(f, ", {first} to {last}")?;
        }
        Ok(())
    }
}

/// Run the tracker once.
pub async fn run(options: &RunOptions) -> Result<RunReport, RunError> {
    let html = match &options.source {
        PageSource::Remote(config) => {
            let fetcher = PageFetcher::new(config)?;
            println!("Fetching {} ...", fetcher.url());
            fetcher.fetch().await?
        }
        PageSource::File(path) => {
            println!("Reading {} ...", path.display());
            std::fs::read_to_string(path).map_err(|source| RunError::Input {
                path: path.clone(),
                source,
            })?
        }
    };

    let store = DatasetStore::new(&options.data_dir);
    process_page(&html, &store, options.same_day)
}

/// Parse `html`, merge it into the dataset in `store`, and persist the result.
pub fn process_page(
    html: &str,
    store: &DatasetStore,
    same_day: SameDatePolicy,
) -> Result<RunReport, RunError> {
    let rows = parse_history(html)?;
    println!("Found {} history records", rows.len());

    let snapshot = parse_snapshot(html);
    for warning in &snapshot.warnings {
        tracing::warn!("{warning}");
    }
    let parsed = rows.len();
    let snapshot_tiers = snapshot.values.len();
    let points = build_points(rows, &snapshot.values);

    let prior = store.load()?;
    let prior_len = prior.as_ref().map(|d| d.len());
    let prior_latest = prior.as_ref().and_then(|d| d.latest_date());
    if let Some(len) = prior_len {
        match prior_latest {
            Some(latest) => println!("Existing dataset: {len} records, latest {latest}"),
            None => println!("Existing dataset is empty"),
        }
    }

    let outcome = merge(prior, points, same_day);
    let written = if outcome.requires_write() {
        store.save(outcome.dataset())?;
        tracing::info!(
            "wrote {} and {} in {}",
            CSV_FILE_NAME,
            JSON_FILE_NAME,
            store.dir().display()
        );
        true
    } else {
        // The CSV is current; bring a missing or stale JSON file back in line.
        store.sync_json(outcome.dataset())?
    };

    let refreshed = matches!(outcome, MergeOutcome::Refreshed { .. });
    let added = outcome.added();
    let dataset = outcome.into_dataset();

    Ok(RunReport {
        parsed,
        snapshot_tiers,
        snapshot_warnings: snapshot.warnings.len(),
        prior_len,
        prior_latest,
        added,
        refreshed,
        written,
        total: dataset.len(),
        first_date: dataset.first_date(),
        last_date: dataset.latest_date(),
    })
}
