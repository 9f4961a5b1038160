//! Prompt-to-image client: fans a prompt out into concurrent requests against
//! an endpoint whose answers can be raw bytes, arbitrary JSON, or plain text,
//! resolves each answer into a displayable image reference, and keeps a
//! bounded history of the results.

pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod storage;
pub mod studio;

pub use config::{HistoryConfig, ProgressConfig, StudioConfig};
pub use error::{
    GenerationError, GenerationErrorKind, PersistenceError, ResolutionError, Result, StudioError,
};
pub use models::{GenerationRequest, ImageRecord};
pub use storage::{FileStore, HistoryStore, KeyValueStore, MemoryStore};
pub use studio::{
    Generator, ImageClient, ImageSource, Progress, ProgressPhase, RawResponse, StudioClient,
};
