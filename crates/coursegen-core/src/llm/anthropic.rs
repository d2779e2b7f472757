//! Anthropic Messages API backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::retry::RetryPolicy;
use super::{GenerationRequest, GenerationResponse, ServiceError, TextGenerator};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_VERSION: &str = "2023-06-01";

/// Connection settings for [`AnthropicClient`].
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// [`TextGenerator`] over `POST /v1/messages`.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    async fn send_once(&self, request: &GenerationRequest) -> Result<GenerationResponse, ServiceError> {
        let body = MessagesBody {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.context.as_deref(),
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: MessagesReply = resp
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        let text: String = reply
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();

        // An empty reply is still billed; the caller tracks usage before rejecting it.
        Ok(GenerationResponse {
            text,
            input_tokens: reply.usage.input_tokens,
            output_tokens: reply.usage.output_tokens,
        })
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, ServiceError> {
        tracing::debug!(
            model = %request.model,
            max_tokens = request.max_tokens,
            prompt_chars = request.prompt.len(),
            "sending messages request"
        );
        self.config.retry.run(|| self.send_once(request)).await
    }
}
