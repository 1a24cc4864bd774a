/// Edge-table machinery shared by both status enums.
pub mod lifecycle;
/// Match statuses.
pub mod match_machine;
/// Player request statuses.
pub mod request_machine;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::RwLock;

use crate::{
    auth::AuthKeys, config::AppConfig, dao::store::EntityStore, error::ServiceError,
};

/// Handle to the state shared by handlers and background tasks.
pub type SharedState = Arc<AppState>;

/// Central application state: the installed store, degraded flag, configuration and auth keys.
pub struct AppState {
    store: RwLock<Option<Arc<dyn EntityStore>>>,
    degraded: AtomicBool,
    config: AppConfig,
    auth: AuthKeys,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let auth = AuthKeys::from_secret(&config.jwt_secret);
        Arc::new(Self {
            store: RwLock::new(None),
            degraded: AtomicBool::new(true),
            config,
            auth,
        })
    }

    /// Construct a state with `store` already installed.
    pub fn with_store(config: AppConfig, store: Arc<dyn EntityStore>) -> SharedState {
        let auth = AuthKeys::from_secret(&config.jwt_secret);
        Arc::new(Self {
            store: RwLock::new(Some(store)),
            degraded: AtomicBool::new(false),
            config,
            auth,
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn EntityStore>> {
        self.store.read().await.as_ref().cloned()
    }

    /// Current store or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn EntityStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a store implementation and leave degraded mode.
    pub async fn set_store(&self, store: Arc<dyn EntityStore>) {
        *self.store.write().await = Some(store);
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        self.store.write().await.take();
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Set the degraded flag, returning whether it changed.
    pub fn update_degraded(&self, value: bool) -> bool {
        self.degraded.swap(value, Ordering::AcqRel) != value
    }

    /// Configuration loaded at startup.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Token verification keys.
    pub fn auth(&self) -> &AuthKeys {
        &self.auth
    }
}
