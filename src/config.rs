//! Application-level configuration: a JSON file with environment overrides on top.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ACADEMY_ARENA_CONFIG_PATH";
/// Secret used when none is configured; only suitable for local runs.
pub const DEVELOPMENT_JWT_SECRET: &str = "development-secret-change-in-production";

/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// MongoDB, supervised with reconnects.
    Mongo,
    /// Process-local maps; data is lost on restart.
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Some(StoreBackend::Mongo),
            "memory" => Some(StoreBackend::Memory),
            _ => None,
        }
    }
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// MongoDB connection string.
    pub mongo_uri: String,
    /// MongoDB database name.
    pub mongo_db: String,
    /// Which store to install at startup.
    pub store_backend: StoreBackend,
    /// HS256 secret used to verify bearer tokens.
    pub jwt_secret: String,
    /// How long a finished match survives before cleanup.
    pub finished_match_grace_secs: u64,
    /// Pause between sweeper runs.
    pub sweep_interval_secs: u64,
    /// How long a rejected player request survives before it expires.
    pub request_rejection_ttl_secs: u64,
    /// Arm a per-match timer on finish in addition to the sweeper.
    pub deferred_deletion: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            mongo_uri: "mongodb://localhost:27017".into(),
            mongo_db: "academy_arena".into(),
            store_backend: StoreBackend::Mongo,
            jwt_secret: DEVELOPMENT_JWT_SECRET.into(),
            finished_match_grace_secs: 900,
            sweep_interval_secs: 60,
            request_rejection_ttl_secs: 900,
            deferred_deletion: true,
        }
    }
}

impl AppConfig {
    /// Load the configuration file, then apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::from_file();
        config.apply_overrides(|key| env::var(key).ok());
        if config.jwt_secret == DEVELOPMENT_JWT_SECRET {
            warn!("JWT_SECRET not configured; using the development secret");
        }
        config
    }

    fn from_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration file");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Override individual keys from the environment, read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(port) = non_empty("PORT")
            .or_else(|| non_empty("SERVER_PORT"))
            .and_then(|value| value.trim().parse::<u16>().ok())
        {
            self.port = port;
        }
        if let Some(uri) = non_empty("MONGO_URI") {
            self.mongo_uri = uri;
        }
        if let Some(db) = non_empty("MONGO_DB") {
            self.mongo_db = db;
        }
        if let Some(secret) = non_empty("JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Some(raw) = non_empty("STORE_BACKEND") {
            match StoreBackend::parse(&raw) {
                Some(backend) => self.store_backend = backend,
                None => warn!(value = %raw, "unknown STORE_BACKEND; keeping configured backend"),
            }
        }
    }

    /// Grace window between finishing a match and deleting it.
    pub fn finished_match_grace(&self) -> Duration {
        Duration::from_secs(self.finished_match_grace_secs)
    }

    /// Period of the cleanup sweep.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Lifetime of a rejected player request.
    pub fn request_rejection_ttl(&self) -> Duration {
        Duration::from_secs(self.request_rejection_ttl_secs)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "port": 9000, "store_backend": "memory" }"#).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.finished_match_grace(), Duration::from_secs(900));
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert!(config.deferred_deletion);
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SERVER_PORT", "7000"),
            ("MONGO_DB", "arena_test"),
            ("JWT_SECRET", "s3cret"),
            ("STORE_BACKEND", "Memory"),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.port, 7000);
        assert_eq!(config.mongo_db, "arena_test");
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.mongo_uri, AppConfig::default().mongo_uri);
    }

    #[test]
    fn port_prefers_port_and_ignores_garbage() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| match key {
            "PORT" => Some("not-a-port".into()),
            "SERVER_PORT" => Some("7001".into()),
            _ => None,
        });
        assert_eq!(config.port, 8080);

        config.apply_overrides(|key| (key == "PORT").then(|| "7002".into()));
        assert_eq!(config.port, 7002);
    }

    #[test]
    fn unknown_backend_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| (key == "STORE_BACKEND").then(|| "couch".into()));
        assert_eq!(config.store_backend, StoreBackend::Mongo);
    }

    #[test]
    fn sweep_interval_never_zero() {
        let config = AppConfig {
            sweep_interval_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }
}
