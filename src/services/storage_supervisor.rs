use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{storage::StorageError, store::EntityStore},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Exponential delay between attempts, capped at [`MAX_DELAY`].
struct Backoff {
    current: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            current: INITIAL_DELAY,
        }
    }

    async fn wait(&mut self) {
        sleep(self.current).await;
        self.current = (self.current * 2).min(MAX_DELAY);
    }
}

/// Connect to the storage backend, install it, and keep it healthy.
///
/// The shared state stays degraded while no store answers. When an installed store fails its
/// health check and a few reconnects do not help, it is uninstalled and `connect` runs again.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn EntityStore>, StorageError>> + Send,
{
    let mut backoff = Backoff::new();

    loop {
        match connect().await {
            Ok(store) => {
                state.set_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                backoff = Backoff::new();

                supervise(&state, store.as_ref()).await;
                state.clear_store().await;
                warn!("storage dropped after failed reconnects; connecting again");
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
            }
        }
        backoff.wait().await;
    }
}

/// Poll the store until it fails and cannot be reconnected.
async fn supervise(state: &SharedState, store: &dyn EntityStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.update_degraded(false) {
                    info!("storage healthy again; leaving degraded mode");
                }
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed; entering degraded mode");
                state.update_degraded(true);
                if !reconnect(store).await {
                    warn!("exhausted storage reconnect attempts");
                    return;
                }
                state.update_degraded(false);
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(store: &dyn EntityStore) -> bool {
    let mut backoff = Backoff::new();
    for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded");
                return true;
            }
            Err(err) => {
                warn!(attempt, error = %err, "storage reconnect attempt failed");
                backoff.wait().await;
            }
        }
    }
    false
}
