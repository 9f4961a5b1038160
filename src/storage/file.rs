use crate::{error::PersistenceError, storage::traits::KeyValueStore};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;

/// One `<key>.json` file per slot under a directory.
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn slot_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.directory.join(format!("{}.json", name))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.slot_path(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.directory).await?;
        let path = self.slot_path(key);
        // Write then rename so readers never see a half-written slot.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value).await?;
        fs::rename(&staging, &path).await?;
        log::debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }
}
