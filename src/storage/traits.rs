use crate::error::PersistenceError;
use async_trait::async_trait;

/// A named-slot store. Values are whole documents; a write replaces the slot.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` when the slot was never written.
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}
