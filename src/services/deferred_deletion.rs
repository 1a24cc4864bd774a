//! Per-match cleanup timers armed when a match finishes.
//!
//! Timers are process-local and fire-and-forget: they are lost on restart and nothing cancels
//! them. The sweeper re-derives the same outcome from stored timestamps, so a missed or stale
//! timer only delays cleanup.

use std::time::Duration;

use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::{SharedState, match_machine::MatchStatus};

/// Delete match `id` after `delay`, provided it is still finished at that point.
pub fn schedule(state: SharedState, id: Uuid, delay: Duration) -> JoinHandle<()> {
    debug!(match_id = %id, delay_secs = delay.as_secs(), "armed deferred match deletion");
    tokio::spawn(async move {
        sleep(delay).await;
        fire(&state, id).await;
    })
}

async fn fire(state: &SharedState, id: Uuid) {
    let Some(store) = state.store().await else {
        warn!(match_id = %id, "storage unavailable; leaving deferred deletion to the sweeper");
        return;
    };

    match store.delete_match_if_status(id, MatchStatus::Finished).await {
        Ok(true) => info!(match_id = %id, "deleted finished match"),
        Ok(false) => debug!(match_id = %id, "match gone or no longer finished; nothing to delete"),
        Err(err) => warn!(match_id = %id, error = %err, "deferred match deletion failed"),
    }
}
