//! Text generation capability and the clients that provide it.
//!
//! # Architecture
//!
//! The pipeline treats the generation service as a black box: given a prompt and a
//! requested output shape, it returns text or fails. That contract is the
//! [`TextGenerator`] trait. [`gemini::GeminiClient`] is the production
//! implementation (Gemini `generateContent`, non-streaming).
//!
//! # Error Handling
//!
//! Every failure is a [`GenerationError`]. None of them are fatal to a run: the
//! caller decides whether to retry. Rate-limit responses carry the server's
//! `Retry-After` hint (see [`retry::parse_retry_after`]).

pub mod gemini;
pub mod retry;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub use gemini::{DEFAULT_GEMINI_MODEL, GEMINI_API_BASE_URL, GeminiClient};

/// MIME type requesting a JSON-only response body.
pub const JSON_MIME_TYPE: &str = "application/json";

const CONNECT_TIMEOUT_SECS: u64 = 30;

// Note: reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// A single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Requested output shape, e.g. [`JSON_MIME_TYPE`]. `None` means free text.
    pub response_mime_type: Option<String>,
    /// Sampling temperature. Low values are near-deterministic.
    pub temperature: f32,
}

impl GenerationRequest {
    /// A request for a JSON response at the given temperature.
    pub fn json(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            response_mime_type: Some(JSON_MIME_TYPE.to_string()),
            temperature,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },
    #[error("API error: {0}")]
    Api(String),
    #[error("response contained no text")]
    EmptyResponse,
    #[error("generation stopped: {0}")]
    Blocked(String),
}

impl GenerationError {
    /// Server-requested wait before the next attempt, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// The external text-generation capability.
///
/// Implementations must not retry internally; retry policy belongs to the caller.
pub trait TextGenerator {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

impl<T: TextGenerator + Sync> TextGenerator for &T {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send {
        (**self).generate(request)
    }
}

fn base_client_builder(https_only: bool) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .https_only(https_only)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
}

pub fn http_client_with_timeout(
    timeout: Duration,
    https_only: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder(https_only).timeout(timeout).build()
}

pub async fn read_capped_error_body(mut response: reqwest::Response) -> String {
    let mut body = Vec::new();
    while let Ok(Some(chunk)) = response.chunk().await {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
