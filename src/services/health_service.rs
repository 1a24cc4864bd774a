use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report `degraded` when no store is installed or the installed one fails its ping.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Some(store) = state.store().await else {
        warn!("storage unavailable (degraded mode)");
        return HealthResponse::degraded(None);
    };

    let backend = store.backend();
    match store.health_check().await {
        Ok(()) if !state.is_degraded() => HealthResponse::ok(backend),
        Ok(()) => HealthResponse::degraded(Some(backend)),
        Err(err) => {
            warn!(store = backend, error = %err, "storage health check failed");
            HealthResponse::degraded(Some(backend))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::store::memory::MemoryStore, dto::health::HealthStatus,
        state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_without_a_store() {
        let state = AppState::new(AppConfig::default());
        let degraded = health_status(&state).await;
        assert_eq!(degraded.status, HealthStatus::Degraded);
        assert!(degraded.store.is_none());

        state.set_store(Arc::new(MemoryStore::new())).await;
        let healthy = health_status(&state).await;
        assert_eq!(healthy.status, HealthStatus::Ok);
        assert_eq!(healthy.store.as_deref(), Some("memory"));
    }

    #[tokio::test]
    async fn flagged_store_is_reported_as_degraded() {
        let state = AppState::with_store(AppConfig::default(), Arc::new(MemoryStore::new()));
        state.update_degraded(true);
        let response = health_status(&state).await;
        assert_eq!(response.status, HealthStatus::Degraded);
        assert_eq!(response.store.as_deref(), Some("memory"));
    }
}
