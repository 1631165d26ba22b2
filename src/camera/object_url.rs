/// Object URLs: temporary display handles for in-memory image data
///
/// A handle keeps its bytes alive until it is revoked, so every handle the
/// capture screen creates must be revoked when the photo is replaced or cleared.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

const SCHEME_PREFIX: &str = "blob:capture-meter/";

/// Opaque `blob:` style reference into an [`ObjectUrls`] registry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry of live object URLs
#[derive(Debug, Clone, Default)]
pub struct ObjectUrls {
    entries: Arc<Mutex<HashMap<ObjectUrl, Arc<Vec<u8>>>>>,
}

impl ObjectUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return a fresh handle for them
    pub fn create(&self, bytes: Arc<Vec<u8>>) -> ObjectUrl {
        let url = ObjectUrl(format!("{}{}", SCHEME_PREFIX, Uuid::new_v4()));
        self.entries.lock().insert(url.clone(), bytes);
        tracing::trace!(%url, "Created object URL");
        url
    }

    /// Release a handle. Returns false if it was not live.
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        let removed = self.entries.lock().remove(url).is_some();
        if removed {
            tracing::trace!(%url, "Revoked object URL");
        }
        removed
    }

    /// Bytes behind a live handle
    pub fn resolve(&self, url: &ObjectUrl) -> Option<Arc<Vec<u8>>> {
        self.entries.lock().get(url).cloned()
    }

    pub fn is_live(&self, url: &ObjectUrl) -> bool {
        self.entries.lock().contains_key(url)
    }

    pub fn live_count(&self) -> usize {
        self.entries.lock().len()
    }
}
