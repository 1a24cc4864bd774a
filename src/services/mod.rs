/// Per-match cleanup timers.
pub mod deferred_deletion;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Match lifecycle engine.
pub mod match_service;
/// Player-request lifecycle engine.
pub mod request_service;
/// Storage connection supervisor with reconnect backoff.
pub mod storage_supervisor;
/// Periodic cleanup of expired records.
pub mod sweeper;
