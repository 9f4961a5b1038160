use crate::{
    config::StudioConfig,
    error::{GenerationError, StudioError},
};
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header::CONTENT_TYPE, Client};

/// Bytes left as-is in the prompt: ASCII alphanumerics and `-_.!~*'()`.
/// Everything else, space included, becomes `%XX`.
const PROMPT_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// An upstream answer, captured before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.map(String::from),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn error_for_status(self) -> Result<Self, GenerationError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(GenerationError::HttpStatus {
                status: self.status,
            })
        }
    }
}

/// Something that turns a prompt into one raw upstream response.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, prompt: &str) -> Result<RawResponse, GenerationError>;
}

/// `GET <endpoint>?prompt=<prompt>` against the configured generation endpoint.
#[derive(Clone)]
pub struct ImageClient {
    client: Client,
    endpoint: String,
}

impl ImageClient {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &StudioConfig) -> Result<Self, StudioError> {
        if config.endpoint.trim().is_empty() {
            return Err(StudioError::Config("generation endpoint is required".into()));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| StudioError::Client(e.to_string()))?;

        Ok(Self::new(client, config.endpoint.trim()))
    }

    fn request_url(&self, prompt: &str) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}prompt={}",
            self.endpoint,
            separator,
            utf8_percent_encode(prompt, PROMPT_COMPONENT)
        )
    }

    fn build_request(&self, prompt: &str) -> reqwest::RequestBuilder {
        self.client.get(self.request_url(prompt))
    }
}

#[async_trait]
impl ImageSource for ImageClient {
    async fn fetch(&self, prompt: &str) -> Result<RawResponse, GenerationError> {
        log::debug!("Requesting image from {}", self.endpoint);

        let response = self.build_request(prompt).send().await.map_err(|e| {
            log::error!("Image request failed: {}", e);
            GenerationError::Network(e.to_string())
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        log::debug!(
            "Upstream answered {} ({}, {} bytes)",
            status,
            content_type.as_deref().unwrap_or("no content type"),
            body.len()
        );

        Ok(RawResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}
