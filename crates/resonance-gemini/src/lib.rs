//! Resonance Gemini - Google Gemini backend
//!
//! Implements [`GenerativeModel`] over the Gemini `generateContent` REST
//! endpoint. Every provider failure is mapped to a [`ModelError`]; the
//! annotation services surface it as `ExternalCallFailed`.
//!
//! # Example
//!
//! ```rust,ignore
//! use resonance_core::{analyze_triad, ModelSettings, Triad};
//! use resonance_gemini::GeminiClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GeminiClient::from_settings(&ModelSettings::default())?;
//! let label = analyze_triad(&client, &Triad::new("a", "b", "c")).await?;
//! # Ok(())
//! # }
//! ```

mod wire;

use async_trait::async_trait;
use resonance_core::{ConfigError, GenerativeModel, ModelError, ModelSettings};
use std::time::Duration;
use wire::{GenerateContentRequest, GenerateContentResponse};

/// Longest provider error body kept in a `ModelError`
const MAX_ERROR_BODY: usize = 512;

/// Errors while building a client
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    /// Settings are incomplete (e.g. no API key)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP client could not be constructed
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Gemini REST client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
    timeout: Duration,
    temperature: Option<f32>,
    json_mode: bool,
}

impl GeminiClient {
    /// Create client for `model` with default settings otherwise
    ///
    /// # Errors
    /// - `GeminiError::Client` if the HTTP client cannot be built
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, GeminiError> {
        let settings = ModelSettings {
            model: model.into(),
            ..ModelSettings::default()
        };
        Self::build(&settings, api_key.into())
    }

    /// Create client from settings, reading the API key from the environment
    ///
    /// # Errors
    /// - `GeminiError::Config` if the API key variable is unset
    /// - `GeminiError::Client` if the HTTP client cannot be built
    pub fn from_settings(settings: &ModelSettings) -> Result<Self, GeminiError> {
        let api_key = settings.api_key()?;
        Self::build(settings, api_key)
    }

    fn build(settings: &ModelSettings, api_key: String) -> Result<Self, GeminiError> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let http = http_client(timeout)?;

        Ok(Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
            timeout,
            temperature: settings.temperature,
            json_mode: settings.json_mode,
        })
    }

    /// Point the client at another API base (proxies, tests)
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the per-request timeout
    ///
    /// # Errors
    /// - `GeminiError::Client` if the HTTP client cannot be rebuilt
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, GeminiError> {
        self.http = http_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Model identifier
    #[inline]
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    fn classify(&self, error: &reqwest::Error) -> ModelError {
        if error.is_timeout() {
            ModelError::Timeout(self.timeout)
        } else {
            ModelError::Transport(error.to_string())
        }
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("resonance-annotator/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let body = GenerateContentRequest::new(prompt, self.temperature, self.json_mode);

        tracing::debug!(model = %self.model, "sending generateContent request");
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| message.is_char_boundary(i))
                    .unwrap_or(0);
                message.truncate(cut);
            }
            tracing::warn!(status = status.as_u16(), "gemini request rejected");
            return Err(ModelError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let payload: GenerateContentResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(self.timeout)
            } else {
                ModelError::Transport(format!("undecodable response body: {e}"))
            }
        })?;

        payload.text().ok_or_else(|| {
            tracing::warn!(reason = ?payload.block_reason(), "gemini returned no text");
            ModelError::EmptyResponse
        })
    }
}
