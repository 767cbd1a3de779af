pub mod expiry;
pub mod fields;
pub mod ledger;
pub mod lifecycle;
mod sse;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::pool_store::PoolStore, error::ServiceError};

pub use self::sse::{EventBroadcaster, SseHub};

pub type SharedState = Arc<AppState>;

/// Central application state: the installed storage backend, configuration and
/// the event fan-out.
pub struct AppState {
    store: RwLock<Option<Arc<dyn PoolStore>>>,
    config: Arc<AppConfig>,
    sse: Arc<SseHub>,
    broadcaster: Arc<dyn EventBroadcaster>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct the shared state publishing events to its own SSE hub.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let sse = Arc::new(SseHub::new(config.event_capacity));
        Self::build(config, sse.clone(), sse)
    }

    /// Construct the shared state with a custom event sink; the SSE hub stays idle.
    pub fn with_broadcaster(
        config: AppConfig,
        broadcaster: Arc<dyn EventBroadcaster>,
    ) -> SharedState {
        let sse = Arc::new(SseHub::new(config.event_capacity));
        Self::build(config, sse, broadcaster)
    }

    fn build(
        config: AppConfig,
        sse: Arc<SseHub>,
        broadcaster: Arc<dyn EventBroadcaster>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            config: Arc::new(config),
            sse,
            broadcaster,
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn PoolStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the store, failing with [`ServiceError::Degraded`] while degraded.
    pub async fn require_store(&self) -> Result<Arc<dyn PoolStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn PoolStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Hub feeding the `/sse/events` stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Sink every lifecycle and ledger event goes through.
    pub fn broadcaster(&self) -> &dyn EventBroadcaster {
        self.broadcaster.as_ref()
    }
}
