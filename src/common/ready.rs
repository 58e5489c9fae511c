//! Readiness polling.
//!
//! Engines loaded into a document announce readiness some time after their
//! script resource is fetched. Callers await that signal through
//! [`await_ready`] instead of sprinkling timers around.

use crate::common::{Error, Result};
use std::time::Duration;
use tokio::time::Instant;

/// Poll `probe` every `poll_interval` until it returns `true` or `deadline` elapses.
///
/// The probe is checked once immediately, so an already-ready engine never waits.
pub async fn await_ready<F>(mut probe: F, poll_interval: Duration, deadline: Duration) -> Result<()>
where
    F: FnMut() -> bool,
{
    let started = Instant::now();
    let poll_interval = poll_interval.max(Duration::from_millis(1));
    loop {
        if probe() {
            tracing::debug!(waited_ms = started.elapsed().as_millis() as u64, "engine ready");
            return Ok(());
        }
        let elapsed = started.elapsed();
        if elapsed >= deadline {
            return Err(Error::timeout("waiting for engine readiness", elapsed));
        }
        tokio::time::sleep(poll_interval.min(deadline - elapsed)).await;
    }
}
