//! Bitcoin address-distribution tracker — page parsing, dataset merge, and CSV/JSON storage.

pub mod builder;
pub mod history;
pub mod merge;
pub mod snapshot;
pub mod storage;
pub mod types;

pub use builder::build_points;
pub use history::{parse_history, HistoryRow};
pub use merge::{merge, MergeOutcome, SameDatePolicy};
pub use snapshot::{parse_snapshot, SnapshotParse, SnapshotWarning};
pub use storage::{DatasetStore, CSV_FILE_NAME, JSON_FILE_NAME};
pub use types::*;
