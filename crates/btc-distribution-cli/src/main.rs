//! btc-distribution — entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use btc_distribution::{DatasetStore, SameDatePolicy};
use btc_distribution_cli::config::{resolve_data_dir, FetchConfig};
use btc_distribution_cli::pipeline::{self, PageSource, RunOptions, EXIT_OK};
use btc_distribution_cli::render_summary;

#[derive(Parser)]
#[command(
    name = "btc-distribution",
    about = "Track the Bitcoin address-balance distribution history",
    version
)]
struct Cli {
    /// Directory holding btc_history_full.csv and data.json.
    /// Also reads from BTC_DIST_DATA_DIR.
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the page and append new days to the dataset (default).
    Run {
        /// Page URL. Also reads from BTC_DIST_URL.
        #[arg(long)]
        url: Option<String>,

        /// Parse a saved copy of the page instead of fetching it.
        #[arg(long, conflicts_with = "url")]
        input: Option<PathBuf>,

        /// Request timeout in milliseconds. Also reads from BTC_DIST_TIMEOUT_MS.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Retries after a failed request. Also reads from BTC_DIST_RETRIES.
        #[arg(long)]
        retries: Option<u32>,

        /// What to do when the latest stored day is fetched again (skip, overwrite).
        #[arg(long, default_value = "skip")]
        same_day: SameDatePolicy,
    },

    /// Print the size, date range and latest rows of the stored dataset.
    Summary {
        /// Number of trailing rows to show.
        #[arg(long, default_value = "5")]
        rows: usize,

        /// Print the trailing rows as JSON records.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let data_dir = resolve_data_dir(cli.data_dir.as_deref());

    match cli.command.unwrap_or(Commands::Run {
        url: None,
        input: None,
        timeout_ms: None,
        retries: None,
        same_day: SameDatePolicy::Skip,
    }) {
        Commands::Run {
            url,
            input,
            timeout_ms,
            retries,
            same_day,
        } => {
            let source = match input {
                Some(path) => PageSource::File(path),
                None => PageSource::Remote(FetchConfig::resolve(url, timeout_ms, retries)),
            };
            let options = RunOptions {
                source,
                data_dir,
                same_day,
            };

            let code = match pipeline::run(&options).await {
                Ok(report) => {
                    println!("{report}");
                    EXIT_OK
                }
                Err(e) => {
                    tracing::error!("run failed: {e}");
                    e.exit_code()
                }
            };
            if code != EXIT_OK {
                std::process::exit(code);
            }
        }

        Commands::Summary { rows, json } => {
            let store = DatasetStore::new(&data_dir);
            match store.load()? {
                None => {
                    println!("No dataset at {}", store.csv_path().display());
                }
                Some(dataset) if json => {
                    println!("{}", serde_json::to_string_pretty(dataset.tail(rows))?);
                }
                Some(dataset) => {
                    print!("{}", render_summary(&dataset, rows));
                }
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "btc-distribution", &mut std::io::stdout());
        }
    }

    Ok(())
}
