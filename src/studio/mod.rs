pub mod generator;
pub mod image_client;
pub mod progress;
pub mod resolver;

use crate::{
    config::StudioConfig,
    error::Result,
    models::ImageRecord,
    storage::{FileStore, HistoryStore, KeyValueStore},
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub use generator::Generator;
pub use image_client::{ImageClient, ImageSource, RawResponse};
pub use progress::{Progress, ProgressPhase, ProgressTracker};
pub use resolver::resolve;

/// Generation plus history: a successful batch is returned to the caller and
/// recorded, a failed or cancelled one is neither.
#[derive(Clone)]
pub struct StudioClient {
    generator: Generator,
    history: Arc<HistoryStore>,
}

impl StudioClient {
    /// HTTP source against `config.endpoint`, history in a file under
    /// `config.history.directory`.
    pub async fn new(config: StudioConfig) -> Result<Self> {
        let source = Arc::new(ImageClient::from_config(&config)?);
        let storage = Arc::new(FileStore::new(config.history.directory.clone()));
        Ok(Self::with_parts(config, source, storage).await)
    }

    pub async fn with_parts(
        config: StudioConfig,
        source: Arc<dyn ImageSource>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        let history = HistoryStore::load(storage, config.history.key, config.history.capacity).await;
        Self {
            generator: Generator::new(source, ProgressTracker::new(config.progress)),
            history: Arc::new(history),
        }
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.generator.progress()
    }

    pub async fn generate(&self, prompt: &str, count: usize) -> Result<Vec<ImageRecord>> {
        let records = self.generator.generate(prompt, count).await?;
        self.record(&records).await;
        Ok(records)
    }

    pub async fn generate_with_cancel(
        &self,
        prompt: &str,
        count: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<ImageRecord>> {
        let records = self
            .generator
            .generate_with_cancel(prompt, count, cancel)
            .await?;
        self.record(&records).await;
        Ok(records)
    }

    async fn record(&self, records: &[ImageRecord]) {
        if !records.is_empty() {
            self.history.add(records.iter().cloned()).await;
        }
    }
}
