//! Library crate for academy-arena-back, exposing modules for binaries and integration tests.

/// Bearer token verification and caller identity.
pub mod auth;
/// Runtime configuration.
pub mod config;
/// Entity records and storage backends.
pub mod dao;
/// HTTP payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP routers.
pub mod routes;
/// Lifecycle engines and background tasks.
pub mod services;
/// Shared application state and status tables.
pub mod state;
