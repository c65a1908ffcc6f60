//! Snapshot store contract.
//!
//! The store is a plain string key-value map. Writes replace the whole value
//! for a key, so a reader observes either the previous snapshot or the new
//! one, never a mix. [`ThingStore`] layers the `thing:{id}:state` key pattern
//! and JSON encoding on top.

use std::sync::Arc;

use async_trait::async_trait;
use thingcast_types::{Thing, ThingId};

use crate::error::StoreError;

/// Key-value storage for serialized snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the value at `key`, or `None` if it was never written.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the value at `key`.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Release backend connections. The default does nothing.
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Typed access to thing snapshots.
#[derive(Clone)]
pub struct ThingStore {
    inner: Arc<dyn SnapshotStore>,
}

impl ThingStore {
    /// Wrap a raw snapshot store.
    pub fn new(inner: Arc<dyn SnapshotStore>) -> Self {
        Self { inner }
    }

    /// Load the current snapshot for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails or the stored JSON is not a
    /// valid [`Thing`].
    pub async fn load(&self, id: &ThingId) -> Result<Option<Thing>, StoreError> {
        match self.inner.get(&id.state_key()).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Store `thing` as the current snapshot for its id.
    ///
    /// Returns the JSON written so callers can publish the identical bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or the write fails.
    pub async fn save(&self, thing: &Thing) -> Result<String, StoreError> {
        let json = serde_json::to_string(thing)?;
        self.inner.set(&thing.id.state_key(), json.clone()).await?;
        Ok(json)
    }

    /// Load every id in `ids` that has a snapshot, preserving `ids` order.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError`] encountered.
    pub async fn load_many(&self, ids: &[ThingId]) -> Result<Vec<Thing>, StoreError> {
        let mut things = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(thing) = self.load(id).await? {
                things.push(thing);
            }
        }
        Ok(things)
    }

    /// Release the underlying store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails to disconnect cleanly.
    pub async fn close(&self) -> Result<(), StoreError> {
        self.inner.close().await
    }
}

impl std::fmt::Debug for ThingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThingStore").finish_non_exhaustive()
    }
}
