//! Periodic cleanup of finished matches and expired player requests.
//!
//! The sweep only looks at persisted timestamps, so it converges to the same result after a
//! restart and running it twice in a row deletes nothing the second time.

use std::time::{Duration, SystemTime};

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

use crate::{
    dao::{storage::StorageResult, store::EntityStore},
    state::SharedState,
};

/// Records removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Finished matches past their grace window.
    pub matches: u64,
    /// Player requests past their expiry.
    pub requests: u64,
}

/// Delete finished matches last written at or before `now - grace` and expired requests.
pub async fn sweep_once(
    store: &dyn EntityStore,
    now: SystemTime,
    grace: Duration,
) -> StorageResult<SweepReport> {
    let cutoff = now.checked_sub(grace).unwrap_or(SystemTime::UNIX_EPOCH);
    let matches = store.delete_finished_matches(cutoff).await?;
    let requests = store.purge_expired_requests(now).await?;
    Ok(SweepReport { matches, requests })
}

/// Run [`sweep_once`] on the configured interval for the lifetime of the process.
pub fn spawn(state: SharedState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let grace = state.config().finished_match_grace();
        let mut ticker = interval(state.config().sweep_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(store) = state.store().await else {
                debug!("storage unavailable; skipping sweep");
                continue;
            };

            match sweep_once(store.as_ref(), SystemTime::now(), grace).await {
                Ok(report) if report == SweepReport::default() => debug!("sweep found nothing"),
                Ok(report) => info!(
                    matches = report.matches,
                    requests = report.requests,
                    "sweep removed expired records"
                ),
                Err(err) => warn!(error = %err, "sweep failed; retrying next tick"),
            }
        }
    })
}
