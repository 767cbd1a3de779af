//! Shared fixtures for service tests: an in-memory store and a broadcaster that
//! records what it was asked to publish.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::{
    config::AppConfig,
    dao::pool_store::memory::MemoryPoolStore,
    dto::sse::ServerEvent,
    state::{AppState, EventBroadcaster, SharedState},
};

#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<ServerEvent>>,
}

impl RecordingBroadcaster {
    /// Names of the published events, in order.
    pub fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| event.event.clone())
            .collect()
    }

    /// Payload of the last event published under `name`.
    pub fn last(&self, name: &str) -> Option<Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|event| event.event.as_deref() == Some(name))
            .map(|event| serde_json::from_str(&event.data).unwrap())
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventBroadcaster for RecordingBroadcaster {
    fn publish(&self, event: ServerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct Harness {
    pub state: SharedState,
    pub store: MemoryPoolStore,
    pub events: Arc<RecordingBroadcaster>,
}

/// Application state backed by a fresh in-memory store.
pub async fn harness() -> Harness {
    harness_with(AppConfig::default()).await
}

pub async fn harness_with(config: AppConfig) -> Harness {
    let events = Arc::new(RecordingBroadcaster::default());
    let state = AppState::with_broadcaster(config, events.clone());
    let store = MemoryPoolStore::new();
    state.install_store(Arc::new(store.clone())).await;
    Harness {
        state,
        store,
        events,
    }
}
