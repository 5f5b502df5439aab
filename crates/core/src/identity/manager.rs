use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::identity::KeyValueStore;

pub const SESSION_KEY: &str = "lervi_session_id";
pub const GUEST_KEY: &str = "lervi_guest_id";

/// Returned by `session_id` when no store is attached (server-side rendering).
pub const DETACHED_SESSION_ID: &str = "ssr";

/// Stable visitor identifiers. Never fails: storage errors degrade to a fresh
/// random id for the affected call.
#[derive(Clone)]
pub struct IdentityManager {
    store: Option<Arc<dyn KeyValueStore>>,
}

impl IdentityManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Manager without persistent storage.
    pub fn detached() -> Self {
        Self { store: None }
    }

    pub fn is_detached(&self) -> bool {
        self.store.is_none()
    }

    pub fn session_id(&self) -> String {
        let Some(store) = &self.store else {
            return DETACHED_SESSION_ID.to_string();
        };

        match store.get(SESSION_KEY) {
            Ok(Some(existing)) => existing,
            Ok(None) => {
                let fresh = Uuid::new_v4().to_string();
                if let Err(e) = store.set(SESSION_KEY, &fresh) {
                    debug!("Failed to persist session id: {e}");
                }
                fresh
            }
            Err(e) => {
                debug!("Failed to read session id: {e}");
                Uuid::new_v4().to_string()
            }
        }
    }

    pub fn guest_id(&self) -> Option<String> {
        let store = self.store.as_ref()?;
        store
            .get(GUEST_KEY)
            .unwrap_or_else(|e| {
                debug!("Failed to read guest id: {e}");
                None
            })
            .filter(|id| !id.is_empty())
    }

    /// Persist the authenticated guest, or clear it when `id` is empty.
    pub fn set_guest_id(&self, id: &str) {
        let Some(store) = &self.store else {
            return;
        };

        let result = if id.is_empty() {
            store.remove(GUEST_KEY)
        } else {
            store.set(GUEST_KEY, id)
        };

        if let Err(e) = result {
            debug!("Failed to update guest id: {e}");
        }
    }
}
