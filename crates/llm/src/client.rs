use std::time::Duration;

use serde::Serialize;
use wastewise_core::{DEFAULT_MODEL, DEFAULT_TTS_MODEL, DEFAULT_TTS_VOICE, Settings};

use crate::ai_types::{ChatRequest, ChatResponse};
use crate::error::LlmError;

/// Retry schedule for transient failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    /// Delay before the first retry; doubled for every further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub(crate) fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(6);
        self.base_delay.saturating_mul(1_u32 << exponent)
    }
}

/// HTTP client for the remote analysis service.
pub struct AnalysisClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) model: String,
    pub(crate) tts_model: String,
    pub(crate) tts_voice: String,
    pub(crate) retry: RetryPolicy,
}

impl std::fmt::Debug for AnalysisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisClient")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("tts_model", &self.tts_model)
            .field("tts_voice", &self.tts_voice)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl AnalysisClient {
    /// Creates a client for the given API key and base URL.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(api_key: String, base_url: String) -> Result<Self, LlmError> {
        Self::with_timeout(api_key, base_url, Duration::from_secs(60))
    }

    /// Creates a client configured from `Settings`.
    ///
    /// # Errors
    /// Returns `LlmError::ClientInit` if no API key is configured or the HTTP
    /// client cannot be built.
    pub fn from_settings(settings: &Settings) -> Result<Self, LlmError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| LlmError::ClientInit("WASTEWISE_API_KEY is not set".to_owned()))?;
        let client = Self::with_timeout(
            api_key,
            settings.api_url.clone(),
            Duration::from_secs(settings.http_timeout_secs),
        )?;
        Ok(Self {
            model: settings.model.clone(),
            tts_model: settings.tts_model.clone(),
            tts_voice: settings.tts_voice.clone(),
            ..client
        })
    }

    fn with_timeout(api_key: String, base_url: String, timeout: Duration) -> Result<Self, LlmError> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::ClientInit(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            base_url,
            model: DEFAULT_MODEL.to_owned(),
            tts_model: DEFAULT_TTS_MODEL.to_owned(),
            tts_voice: DEFAULT_TTS_VOICE.to_owned(),
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a chat completion request and return the reply text.
    ///
    /// # Errors
    /// Returns an error if the request keeps failing, the API returns a
    /// non-transient error status, or the reply cannot be parsed.
    pub(crate) async fn chat_completion(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let body = self.post_with_retry("chat/completions", request).await?;
        let chat_response: ChatResponse =
            serde_json::from_slice(&body).map_err(|e| LlmError::JsonParse {
                context: format!(
                    "chat completion response (body: {})",
                    truncate(&String::from_utf8_lossy(&body), 200)
                ),
                source: e,
            })?;
        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }

    /// POST `request` as JSON to `path`, retrying transient failures with
    /// exponential backoff. Returns the raw success body.
    pub(crate) async fn post_with_retry<T: Serialize + Sync>(
        &self,
        path: &str,
        request: &T,
    ) -> Result<Vec<u8>, LlmError> {
        let url = format!("{}/{path}", self.base_url);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt);
                tracing::warn!(path, "Analysis service retry attempt {attempt}/{} after {delay:?}", self.retry.max_retries);
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(request)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    let err = LlmError::HttpRequest(e);
                    if !err.is_transient() {
                        return Err(err);
                    }
                    last_error = Some(err);
                    continue;
                },
            };

            let status = response.status();
            if status.is_success() {
                match response.bytes().await {
                    Ok(body) => return Ok(body.to_vec()),
                    Err(e) => {
                        last_error = Some(LlmError::HttpRequest(e));
                        continue;
                    },
                }
            }

            let body =
                response.text().await.unwrap_or_else(|_| "Could not read error body".to_owned());
            let err = LlmError::HttpStatus { code: status.as_u16(), body };
            if !err.is_transient() {
                return Err(err);
            }
            last_error = Some(err);
        }

        Err(LlmError::RetriesExhausted(Box::new(last_error.unwrap_or(LlmError::EmptyResponse))))
    }
}

/// Truncates a string to the given maximum length at a char boundary.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    s.get(..end).unwrap_or("")
}
