//! Subscriber-side cache of the last value received from the publisher.

use crate::protocol::is_actionable;
use std::sync::{Arc, RwLock};

/// Placeholder shown before the first value arrives.
pub const NO_DATA_PLACEHOLDER: &str = "No new data yet";

/// Last-known-good copy of the shared value.
///
/// Cloning shares the same slot, so the poll loop and the presenter see one
/// value. Writes only happen through [`ClientCache::reconcile`].
#[derive(Debug, Clone)]
pub struct ClientCache {
    inner: Arc<RwLock<String>>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::with_value(NO_DATA_PLACEHOLDER)
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value.into())),
        }
    }

    pub fn current(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Apply a response to the cache.
    ///
    /// Returns the new value when the response is actionable, `None` for
    /// heartbeats, absent frames and repeats of the cached value.
    pub fn reconcile(&self, response: Option<&str>) -> Option<String> {
        let mut slot = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !is_actionable(response, &slot) {
            return None;
        }
        let value = response?.to_string();
        *slot = value.clone();
        Some(value)
    }
}

impl Default for ClientCache {
    fn default() -> Self {
        Self::new()
    }
}
