use crate::{
    models::{is_image_reference, ImageRecord},
    storage::traits::KeyValueStore,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Newest-first list of generated images, capped at `capacity` and mirrored
/// into a single slot of a [`KeyValueStore`] after every change.
pub struct HistoryStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    capacity: usize,
    items: Mutex<Vec<ImageRecord>>,
}

impl HistoryStore {
    /// Reads the persisted slot. Never fails: anything unreadable starts an
    /// empty history.
    pub async fn load(storage: Arc<dyn KeyValueStore>, key: impl Into<String>, capacity: usize) -> Self {
        let key = key.into();
        let capacity = capacity.max(1);

        let mut items = match storage.read(&key).await {
            Ok(Some(raw)) => parse_history(&raw).unwrap_or_else(|| {
                log::warn!("Stored history under '{}' is malformed, starting empty", key);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("Could not read history '{}': {}", key, e);
                Vec::new()
            }
        };
        items.truncate(capacity);
        log::debug!("Loaded {} history item(s) from '{}'", items.len(), key);

        Self {
            storage,
            key,
            capacity,
            items: Mutex::new(items),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn items(&self) -> Vec<ImageRecord> {
        self.items.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Puts `records` in front, in the order given, and drops the oldest
    /// entries past capacity.
    pub async fn add<I>(&self, records: I)
    where
        I: IntoIterator<Item = ImageRecord>,
    {
        let mut items = self.items.lock().await;
        let mut merged: Vec<ImageRecord> = records.into_iter().collect();
        if merged.is_empty() {
            return;
        }
        let added = merged.len();
        merged.extend(items.drain(..));
        merged.truncate(self.capacity);
        *items = merged;

        log::debug!("Added {} item(s) to history, now {}", added, items.len());
        self.persist(&items).await;
    }

    pub async fn add_one(&self, record: ImageRecord) {
        self.add(std::iter::once(record)).await;
    }

    pub async fn clear(&self) {
        let mut items = self.items.lock().await;
        items.clear();
        log::info!("History cleared");
        self.persist(&items).await;
    }

    // Called with the lock held so the slot always matches memory.
    async fn persist(&self, items: &[ImageRecord]) {
        let serialized = match serde_json::to_string(items) {
            Ok(serialized) => serialized,
            Err(e) => {
                log::error!("Could not serialize history: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.write(&self.key, &serialized).await {
            log::error!("Could not persist history '{}': {}", self.key, e);
        }
    }
}

/// `None` unless `raw` is a JSON array whose every element is a record.
fn parse_history(raw: &str) -> Option<Vec<ImageRecord>> {
    let Value::Array(entries) = serde_json::from_str::<Value>(raw).ok()? else {
        return None;
    };
    entries
        .into_iter()
        .map(|entry| {
            serde_json::from_value::<ImageRecord>(entry)
                .ok()
                .filter(|record| is_image_reference(&record.reference))
        })
        .collect()
}
