//! Readiness polling
//!
//! Used at process startup to wait until a coordinator accepts queries. Each
//! attempt opens a fresh driver connection, runs the probe statement and
//! drains its rows. Transient failures ([`Error::is_transient`]) are retried
//! every [`RETRY_INTERVAL`] until the timeout has elapsed; anything else
//! fails immediately.

use super::connection_string::ConnectionParams;
use crate::config::ClientConfig;
use crate::connection::{Engine, RawConnection, RawCursor};
use crate::metrics::{counters, labels};
use crate::presto::PrestoEngine;
use crate::{Error, Result};
use std::time::Duration;
use tokio::time::Instant;

/// Pause between attempts
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Probe statement used by the shell's `--wait-timeout`
pub const DEFAULT_PROBE: &str = "SELECT 1";

/// Wait until `url` answers `probe` through `engine`.
///
/// Returns the last transient error once `timeout` has elapsed since the
/// first attempt, or the first non-transient error straight away.
pub async fn wait_until_ready<E: Engine>(
    engine: &E,
    url: &str,
    probe: &str,
    timeout: Duration,
) -> Result<()> {
    let params = ConnectionParams::parse(url)?;
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match probe_once(engine, &params, probe).await {
            Ok(()) => {
                counters::readiness_attempt(labels::OUTCOME_OK);
                tracing::info!(attempt, elapsed = ?start.elapsed(), "coordinator ready");
                return Ok(());
            }
            Err(e) if e.is_transient() && start.elapsed() < timeout => {
                counters::readiness_attempt(labels::OUTCOME_RETRY);
                tracing::debug!(attempt, error = %e, "coordinator not ready, retrying");
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
            Err(e) => {
                counters::readiness_attempt(labels::OUTCOME_ERROR);
                tracing::warn!(attempt, error = %e, "giving up waiting for coordinator");
                return Err(e);
            }
        }
    }
}

/// [`wait_until_ready`] against a Presto coordinator using `config`'s
/// transport settings
pub async fn wait_for_presto(
    url: &str,
    probe: &str,
    timeout: Duration,
    config: &ClientConfig,
) -> Result<()> {
    let engine = PrestoEngine::new(config.session_settings(), config.source.clone());
    wait_until_ready(&engine, url, probe, timeout).await
}

async fn probe_once<E: Engine>(engine: &E, params: &ConnectionParams, probe: &str) -> Result<()> {
    let mut connection = engine.connect(params).await?;
    let outcome = async {
        let mut cursor = connection.cursor()?;
        cursor.execute(probe, None).await?;
        cursor.fetch_all().await?;
        cursor.close().await?;
        Ok::<_, Error>(())
    }
    .await;

    if let Err(e) = connection.close().await {
        tracing::debug!(error = %e, "failed to close probe connection");
    }
    outcome
}
