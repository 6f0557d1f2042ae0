// src/scheduler.rs
//
// One background task drives the fetch -> extract -> publish pipeline: an
// immediate run at startup, then ticks at fixed multiples of the update
// interval counted from the start of the previous run. Runs are sequential,
// so they never overlap; a run longer than the interval just makes the next
// tick fire as soon as it finishes. A failed run publishes a failure snapshot
// and the loop carries on — nothing here ever ends the process.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::config::ScrapeConfig;
use crate::extract::{extract, Extraction};
use crate::fetch::Fetcher;
use crate::snapshot::SnapshotStore;

/// Spawn the scheduler loop. The returned handle is aborted on shutdown; an
/// aborted in-flight run publishes nothing.
pub fn spawn(cfg: Arc<ScrapeConfig>, store: SnapshotStore) -> Result<JoinHandle<()>, reqwest::Error> {
    let fetcher = Fetcher::new(&cfg)?;
    let period = cfg.update_interval();

    Ok(tokio::spawn(run_loop(period, move || {
        let cfg = Arc::clone(&cfg);
        let fetcher = fetcher.clone();
        let store = store.clone();
        async move { run_once(&cfg, &fetcher, &store).await }
    })))
}

/// Tick `run` forever on a fixed cadence. The first tick fires immediately;
/// when the previous run overran, exactly one catch-up run starts as soon as
/// it returns and the timer is rearmed a full period from that start. Burst
/// behavior would instead replay every missed tick back-to-back against the
/// upstream.
pub async fn run_loop<F, Fut>(period: Duration, mut run: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        run().await;
    }
}

/// One pipeline run: fetch, extract, publish. Never returns an error — both
/// outcomes end in a published snapshot.
pub async fn run_once(cfg: &ScrapeConfig, fetcher: &Fetcher, store: &SnapshotStore) {
    tracing::info!(url = %cfg.url, "updating match schedule");
    let started = tokio::time::Instant::now();

    match pipeline(cfg, fetcher).await {
        Ok(extraction) => {
            for warning in &extraction.warnings {
                tracing::warn!(%warning, "skipped schedule row");
            }
            let duration = started.elapsed();
            let count = extraction.matches.len();
            store.publish_success(extraction.matches, duration, Utc::now());
            tracing::info!(
                matches = count,
                warnings = extraction.warnings.len(),
                duration_ms = duration.as_millis() as u64,
                "schedule updated"
            );
        }
        Err(error) => {
            let duration = started.elapsed();
            tracing::error!(%error, "scrape failed, keeping last known-good schedule");
            store.publish_failure(duration, Utc::now(), error.to_string());
        }
    }
}

async fn pipeline(cfg: &ScrapeConfig, fetcher: &Fetcher) -> anyhow::Result<Extraction> {
    let body = fetcher.fetch().await?;
    let extraction = extract(&body, cfg.language, cfg.timezone)?;
    Ok(extraction)
}
