// src/fetch.rs
//
// One HTTP GET per attempt against the schedule page, with a bounded
// exponential-backoff retry loop. The fetcher owns no other state; a run that
// exhausts its attempts reports how many it made and the last cause.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::ScrapeConfig;

/// Why a single attempt failed.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("http status {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// All attempts exhausted; carries the final cause.
#[derive(Debug, Error)]
#[error("fetch failed after {attempts} attempts: {last}")]
pub struct FetchError {
    pub attempts: u32,
    #[source]
    pub last: AttemptError,
}

/// Ceiling on a single inter-attempt delay; exponential growth saturates
/// here instead of overflowing `Duration`.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Delay before retrying after `attempt_index` failures (0-based), growing as
/// `factor * 2^attempt_index` seconds up to [`MAX_BACKOFF`].
pub fn backoff_delay(factor: f64, attempt_index: u32) -> Duration {
    Duration::try_from_secs_f64(factor.max(0.0) * 2f64.powi(attempt_index as i32))
        .map(|d| d.min(MAX_BACKOFF))
        .unwrap_or(MAX_BACKOFF)
}

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
    backoff_factor: f64,
}

impl Fetcher {
    pub fn new(cfg: &ScrapeConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("fa-IR,fa;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        let client = reqwest::Client::builder()
            .user_agent(&cfg.user_agent)
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.read_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: cfg.url.clone(),
            max_retries: cfg.max_retries,
            backoff_factor: cfg.backoff_factor,
        })
    }

    /// Fetch the schedule page body, retrying up to `max_retries` extra times.
    pub async fn fetch(&self) -> Result<String, FetchError> {
        let mut failures = 0u32;
        loop {
            match self.attempt().await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    failures += 1;
                    if failures > self.max_retries {
                        return Err(FetchError {
                            attempts: failures,
                            last: e,
                        });
                    }
                    let delay = backoff_delay(self.backoff_factor, failures - 1);
                    tracing::warn!(
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "fetch attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(&self) -> Result<String, AttemptError> {
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }
        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_failure() {
        assert_eq!(backoff_delay(0.5, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(0.5, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(0.5, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(2.0, 3), Duration::from_secs(16));
    }

    #[test]
    fn backoff_is_non_decreasing() {
        let delays: Vec<Duration> = (0..8).map(|i| backoff_delay(0.25, i)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn negative_factor_is_clamped() {
        assert_eq!(backoff_delay(-1.0, 4), Duration::ZERO);
    }

    #[test]
    fn growth_saturates_at_the_ceiling() {
        assert_eq!(backoff_delay(0.5, 64), MAX_BACKOFF);
        // 2^1000 is infinite in f64; still no panic, still the ceiling.
        assert_eq!(backoff_delay(1.0, 1000), MAX_BACKOFF);
        // NaN factors clamp like negatives do.
        assert_eq!(backoff_delay(f64::NAN, 0), Duration::ZERO);
    }
}
