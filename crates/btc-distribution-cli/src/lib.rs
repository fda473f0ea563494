//! Bitcoin address-distribution tracker — fetch, merge and persist the distribution history.

pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod summary;

pub use config::{resolve_data_dir, FetchConfig};
pub use fetch::{FetchError, PageFetcher};
pub use pipeline::{process_page, run, PageSource, RunError, RunOptions, RunReport};
pub use summary::render_summary;
