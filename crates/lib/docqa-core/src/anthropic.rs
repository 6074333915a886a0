//! Anthropic Messages API backend.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::generation::{
    BackendError,
    ContentBlock,
    GenerateFuture,
    GenerationRequest,
    GenerationResponse,
    TextGenerator,
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

const API_VERSION: &str = "2023-06-01";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the Messages API.
#[derive(Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub base_url: String,
}

impl AnthropicConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

/// [`TextGenerator`] backed by the Anthropic Messages API.
pub struct AnthropicClient {
    http: reqwest::Client,
    config: AnthropicConfig,
    endpoint: String,
}

impl AnthropicClient {
    /// Builds the HTTP client. No request deadline is set here; callers bound
    /// each call themselves.
    ///
    /// # Errors
    /// Returns `BackendError` if the HTTP client cannot be constructed.
    pub fn new(config: AnthropicConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("docqa-mcp/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| BackendError::new(format!("failed to build HTTP client: {err}")))?;
        let endpoint = config.endpoint();
        Ok(Self {
            http,
            config,
            endpoint,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(&self, request: GenerationRequest) -> Result<GenerationResponse, BackendError> {
        let body = MessagesRequest::new(&self.config, &request);
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| BackendError::new(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::new(format!("API error {status}: {text}")));
        }

        let payload: MessagesResponse = response
            .json()
            .await
            .map_err(|err| BackendError::new(format!("failed to decode response: {err}")))?;
        Ok(payload.into())
    }
}

impl TextGenerator for AnthropicClient {
    fn generate(&self, request: GenerationRequest) -> GenerateFuture<'_> {
        Box::pin(self.send(request))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

impl<'a> MessagesRequest<'a> {
    fn new(config: &'a AnthropicConfig, request: &'a GenerationRequest) -> Self {
        Self {
            model: &config.model,
            max_tokens: config.max_tokens,
            system: request.system.as_deref(),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<RawContentBlock>,
}

#[derive(Debug, Deserialize)]
struct RawContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl From<MessagesResponse> for GenerationResponse {
    fn from(response: MessagesResponse) -> Self {
        let content = response
            .content
            .into_iter()
            .map(|block| {
                if block.kind == "text" {
                    ContentBlock::Text {
                        text: block.text.unwrap_or_default(),
                    }
                } else {
                    ContentBlock::Other { kind: block.kind }
                }
            })
            .collect();
        Self { content }
    }
}
