use serde::Serialize;
use utoipa::ToSchema;

/// Overall service condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// A store is installed and answers.
    Ok,
    /// No store answers; data operations return 503.
    Degraded,
}

/// Body of `GET /healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: HealthStatus,
    /// Installed storage backend (`mongodb` or `memory`), absent when none is installed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}

impl HealthResponse {
    /// The `backend` store is installed and healthy.
    pub fn ok(backend: &str) -> Self {
        Self {
            status: HealthStatus::Ok,
            store: Some(backend.to_owned()),
        }
    }

    /// Degraded, naming the installed store when there is one.
    pub fn degraded(backend: Option<&str>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            store: backend.map(str::to_owned),
        }
    }
}
