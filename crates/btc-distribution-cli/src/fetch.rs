//! Page fetcher wrapping reqwest.
//!
//! One GET per run. Retries with exponential backoff on connection
//! errors, timeouts and 5xx; honours `Retry-After` on 429.

use std::time::Duration;

use reqwest::StatusCode;

use crate::config::FetchConfig;

/// Upper bound on a server-requested `Retry-After` delay.
const MAX_RETRY_AFTER_SECS: u64 = 10;

/// Upper bound on a single exponential backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Transport-level failures reaching the source page.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP client setup failed: {0}")]
    Client(reqwest::Error),
}

/// HTTP client for the distribution page.
#[derive(Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
    retry_base: Duration,
}

impl PageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            url: config.url.clone(),
            max_retries: config.max_retries,
            retry_base: Duration::from_millis(config.retry_base_ms),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the page body.
    pub async fn fetch(&self) -> Result<String, FetchError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let can_retry = attempt <= self.max_retries;

            let resp = match self.client.get(&self.url).send().await {
                Ok(r) => r,
                Err(e) if can_retry && !e.is_builder() => {
                    self.wait_before_retry(attempt, &e.to_string(), None).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = resp.status();

            if status.is_success() {
                match resp.text().await {
                    Ok(body) => {
                        tracing::debug!("fetched {} bytes from {}", body.len(), self.url);
                        return Ok(body);
                    }
                    Err(e) if can_retry => {
                        self.wait_before_retry(attempt, &e.to_string(), None).await;
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            if status == StatusCode::TOO_MANY_REQUESTS && can_retry {
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(retry_after_delay);
                self.wait_before_retry(attempt, "HTTP 429", retry_after).await;
                continue;
            }

            if status.is_server_error() && can_retry {
                self.wait_before_retry(attempt, &format!("HTTP {}", status.as_u16()), None)
                    .await;
                continue;
            }

            return Err(FetchError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
    }

    async fn wait_before_retry(&self, attempt: u32, reason: &str, delay: Option<Duration>) {
        let delay = delay.unwrap_or_else(|| backoff_delay(self.retry_base, attempt));
        tracing::warn!(
            "fetch attempt {attempt} failed ({reason}); retrying in {}ms",
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
    }
}

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at [`MAX_BACKOFF`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        .min(MAX_BACKOFF)
}

/// Delay requested by a `Retry-After` header in seconds, capped at
/// [`MAX_RETRY_AFTER_SECS`]. HTTP-date values are ignored.
fn retry_after_delay(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
}
