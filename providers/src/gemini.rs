//! Google Gemini `generateContent` client.
//!
//! Non-streaming: one request, one JSON response. The structured-output mode is
//! requested with `generationConfig.responseMimeType`.
//!
//! Note: the Gemini API mixes casing. The request uses `contents` (lowercase) and
//! `generationConfig` (camelCase); responses are camelCase throughout.

use std::time::Duration;

use serde_json::{Value, json};

use crate::{
    GenerationError, GenerationRequest, TextGenerator, http_client_with_timeout,
    read_capped_error_body, retry::retry_hint,
};

/// Canonical Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

// ============================================================================
// Response Types
// ============================================================================

pub(crate) mod typed {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Response {
        pub candidates: Option<Vec<Candidate>>,
        pub error: Option<ErrorInfo>,
        pub prompt_feedback: Option<PromptFeedback>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Candidate {
        pub content: Option<Content>,
        pub finish_reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Content {
        pub parts: Option<Vec<Part>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Part {
        pub text: Option<String>,
        /// Whether this is thinking content
        #[serde(default)]
        pub thought: bool,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PromptFeedback {
        pub block_reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorInfo {
        pub message: Option<String>,
    }

    impl ErrorInfo {
        #[must_use]
        pub fn message_or_default(&self) -> &str {
            self.message.as_deref().unwrap_or("Unknown error")
        }
    }

    /// Known Gemini finish reasons.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FinishReason {
        Stop,
        MaxTokens,
        Safety,
        Recitation,
        Language,
        Blocklist,
        ProhibitedContent,
        Spii,
        Other,
        Unknown,
    }

    impl FinishReason {
        #[must_use]
        pub fn parse(s: &str) -> Self {
            match s {
                "STOP" => Self::Stop,
                "MAX_TOKENS" => Self::MaxTokens,
                "SAFETY" => Self::Safety,
                "RECITATION" => Self::Recitation,
                "LANGUAGE" => Self::Language,
                "BLOCKLIST" => Self::Blocklist,
                "PROHIBITED_CONTENT" => Self::ProhibitedContent,
                "SPII" => Self::Spii,
                "OTHER" => Self::Other,
                _ => Self::Unknown,
            }
        }

        /// Returns error message if this is an error reason, None if success.
        #[must_use]
        pub fn error_message(self) -> Option<&'static str> {
            match self {
                Self::Stop | Self::MaxTokens | Self::Unknown => None,
                Self::Safety => Some("Content filtered by safety settings"),
                Self::Recitation => Some("Response blocked: recitation"),
                Self::Language => Some("Unsupported language"),
                Self::Blocklist => Some("Content contains blocked terms"),
                Self::ProhibitedContent => Some("Prohibited content detected"),
                Self::Spii => Some("Sensitive PII detected"),
                Self::Other => Some("Generation stopped: unknown reason"),
            }
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Gemini API key. `Debug` never prints the secret.
#[derive(Clone)]
struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Client against an arbitrary base URL (proxies, test servers).
    ///
    /// HTTPS is enforced unless the base URL is plain `http://`.
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let https_only = !base_url.starts_with("http://");
        let http = http_client_with_timeout(timeout, https_only)?;
        Ok(Self {
            http,
            api_key: ApiKey(api_key.into()),
            model: model.into(),
            base_url,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Build the request body for Gemini API.
fn build_request_body(request: &GenerationRequest) -> Value {
    let mut generation_config = json!({ "temperature": request.temperature });
    if let Some(mime) = &request.response_mime_type {
        generation_config["responseMimeType"] = json!(mime);
    }

    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": request.prompt }]
        }],
        "generationConfig": generation_config
    })
}

/// Pull the answer text out of a `generateContent` response.
///
/// Text parts of the first candidate are concatenated; thinking parts are dropped.
fn extract_text(response: typed::Response) -> Result<String, GenerationError> {
    if let Some(error) = response.error {
        return Err(GenerationError::Api(error.message_or_default().to_string()));
    }

    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(GenerationError::Blocked(format!("prompt blocked: {reason}")));
    }

    let Some(candidate) = response.candidates.and_then(|c| c.into_iter().next()) else {
        return Err(GenerationError::EmptyResponse);
    };

    let text: String = candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|part| !part.thought)
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        if let Some(reason) = candidate.finish_reason.as_deref()
            && let Some(msg) = typed::FinishReason::parse(reason).error_message()
        {
            return Err(GenerationError::Blocked(msg.to_string()));
        }
        return Err(GenerationError::EmptyResponse);
    }

    Ok(text)
}

impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = build_request_body(request);

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key.0)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_hint(status, response.headers());
            let body = read_capped_error_body(response).await;
            tracing::debug!(status = %status, "Gemini request failed");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
                retry_after,
            });
        }

        let parsed: typed::Response = response.json().await?;
        extract_text(parsed)
    }
}
