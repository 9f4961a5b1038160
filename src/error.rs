use thiserror::Error;

/// Why a response could not be turned into an image reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("image response had an empty body")]
    EmptyBody,
    #[error("no image found in payload")]
    NoImageInPayload,
    #[error("unexpected response format")]
    UnexpectedFormat,
    /// The payload yielded a string that is neither an http(s) URL nor an
    /// image data URL.
    #[error("response did not contain an image reference")]
    NotAnImageReference,
}

/// Discriminator for [`GenerationError`], kept separate so callers can match on
/// the cause without caring about the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    Network,
    HttpStatus,
    Resolution,
    Cancelled,
}

/// The single error a generation batch fails with. `Display` is the short
/// message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error ({status})")]
    HttpStatus { status: u16 },
    #[error("{0}")]
    Resolution(#[from] ResolutionError),
    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    pub fn kind(&self) -> GenerationErrorKind {
        match self {
            GenerationError::Network(_) => GenerationErrorKind::Network,
            GenerationError::HttpStatus { .. } => GenerationErrorKind::HttpStatus,
            GenerationError::Resolution(_) => GenerationErrorKind::Resolution,
            GenerationError::Cancelled => GenerationErrorKind::Cancelled,
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not serialize history: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Client error: {0}")]
    Client(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type Result<T> = std::result::Result<T, StudioError>;
