//! Persistent response store capability
//!
//! A store holds named generations; each generation maps request identities to
//! responses. Concurrent writes to the same identity are last-write-wins.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use thiserror::Error;

use super::request::{RequestIdentity, StoredResponse};

/// Errors that can occur when reading or writing the response store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded
    #[error("Failed to encode record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generation names must be usable as a single path component
    #[error("Invalid generation name: '{0}'")]
    InvalidGeneration(String),

    /// Writes never create a generation; it must have been opened first
    #[error("Generation does not exist: '{0}'")]
    MissingGeneration(String),

    /// The store refused the write (quota, read-only media)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Generation-aware response storage
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Creates the generation if it does not exist yet
    async fn open(&self, generation: &str) -> Result<(), StoreError>;

    /// Looks up a record; a missing generation is simply a miss
    async fn get(
        &self,
        generation: &str,
        identity: &RequestIdentity,
    ) -> Result<Option<StoredResponse>, StoreError>;

    /// Writes or overwrites a record in an existing generation
    ///
    /// Fails with [`StoreError::MissingGeneration`] instead of recreating a
    /// generation that was never opened or has since been deleted.
    async fn put(
        &self,
        generation: &str,
        identity: &RequestIdentity,
        response: &StoredResponse,
    ) -> Result<(), StoreError>;

    /// Names of every existing generation, sorted
    async fn generations(&self) -> Result<Vec<String>, StoreError>;

    /// Deletes a generation with all its records; returns whether it existed
    async fn delete_generation(&self, generation: &str) -> Result<bool, StoreError>;

    /// Number of records in a generation (0 if it does not exist)
    async fn len(&self, generation: &str) -> Result<usize, StoreError>;
}

/// Process-local store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    generations: Mutex<BTreeMap<String, HashMap<RequestIdentity, StoredResponse>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, HashMap<RequestIdentity, StoredResponse>>> {
        self.generations.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn open(&self, generation: &str) -> Result<(), StoreError> {
        self.lock().entry(generation.to_string()).or_default();
        Ok(())
    }

    async fn get(
        &self,
        generation: &str,
        identity: &RequestIdentity,
    ) -> Result<Option<StoredResponse>, StoreError> {
        Ok(self
            .lock()
            .get(generation)
            .and_then(|records| records.get(identity))
            .cloned())
    }

    async fn put(
        &self,
        generation: &str,
        identity: &RequestIdentity,
        response: &StoredResponse,
    ) -> Result<(), StoreError> {
        let mut generations = self.lock();
        let records = generations
            .get_mut(generation)
            .ok_or_else(|| StoreError::MissingGeneration(generation.to_string()))?;
        records.insert(identity.clone(), response.clone());
        Ok(())
    }

    async fn generations(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock().keys().cloned().collect())
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, StoreError> {
        Ok(self.lock().remove(generation).is_some())
    }

    async fn len(&self, generation: &str) -> Result<usize, StoreError> {
        Ok(self.lock().get(generation).map_or(0, HashMap::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(path: &str) -> RequestIdentity {
        RequestIdentity::new("GET", &format!("https://app.example.com{}", path))
    }

    #[tokio::test]
    async fn test_get_from_missing_generation_is_a_miss() {
        let store = MemoryStore::new();
        let result = store.get("fortune-dynamic-v1", &identity("/")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_record() {
        let store = MemoryStore::new();
        let id = identity("/tarot");
        store.open("fortune-dynamic-v1").await.unwrap();

        store
            .put("fortune-dynamic-v1", &id, &StoredResponse::new("u", 200, "first"))
            .await
            .unwrap();
        store
            .put("fortune-dynamic-v1", &id, &StoredResponse::new("u", 200, "second"))
            .await
            .unwrap();

        let stored = store.get("fortune-dynamic-v1", &id).await.unwrap().unwrap();
        assert_eq!(stored.body.as_ref(), b"second");
        assert_eq!(store.len("fortune-dynamic-v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_generations_are_isolated() {
        let store = MemoryStore::new();
        let id = identity("/");
        store.open("fortune-static-v1").await.unwrap();
        store.open("fortune-static-v2").await.unwrap();
        store
            .put("fortune-static-v1", &id, &StoredResponse::new("u", 200, "v1"))
            .await
            .unwrap();

        assert!(store.get("fortune-static-v2", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_into_missing_generation_does_not_create_it() {
        let store = MemoryStore::new();

        let result = store
            .put("fortune-dynamic-v1", &identity("/"), &StoredResponse::new("u", 200, "x"))
            .await;

        assert!(matches!(result, Err(StoreError::MissingGeneration(name)) if name == "fortune-dynamic-v1"));
        assert!(store.generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_after_delete_does_not_resurrect_generation() {
        let store = MemoryStore::new();
        store.open("fortune-dynamic-v1").await.unwrap();
        store.delete_generation("fortune-dynamic-v1").await.unwrap();

        let result = store
            .put("fortune-dynamic-v1", &identity("/"), &StoredResponse::new("u", 200, "x"))
            .await;

        assert!(result.is_err());
        assert!(store.generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_generation_reports_existence() {
        let store = MemoryStore::new();
        store.open("fortune-static-v1").await.unwrap();

        assert!(store.delete_generation("fortune-static-v1").await.unwrap());
        assert!(!store.delete_generation("fortune-static-v1").await.unwrap());
        assert!(store.generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generations_are_sorted() {
        let store = MemoryStore::new();
        store.open("b").await.unwrap();
        store.open("a").await.unwrap();
        assert_eq!(store.generations().await.unwrap(), vec!["a", "b"]);
    }
}
