use crate::{error::PersistenceError, storage::traits::KeyValueStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-lifetime store. Lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        if let Ok(mut slots) = store.slots.lock() {
            slots.insert(key.into(), value.into());
        }
        store
    }

    /// Current raw value of a slot.
    pub fn get(&self, key: &str) -> Option<String> {
        self.slots.lock().ok()?.get(key).cloned()
    }
}

fn poisoned() -> PersistenceError {
    PersistenceError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        "memory store lock poisoned",
    ))
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let slots = self.slots.lock().map_err(|_| poisoned())?;
        Ok(slots.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut slots = self.slots.lock().map_err(|_| poisoned())?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
