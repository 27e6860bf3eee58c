use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{AiResponse, AiService};
use crate::errors::AiError;

const API_VERSION: &str = "2023-06-01";

/// [`AiService`] backed by the Anthropic Messages API.
pub struct AnthropicService {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Whether an HTTP status from the API is worth retrying.
fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
        // 529: API overloaded
        || status.as_u16() == 529
}

fn parse_response(body: &str) -> Result<AiResponse, AiError> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| AiError::Fatal(format!("malformed API response: {}", e)))?;
    let text: String = parsed
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();
    let tokens_used = parsed
        .usage
        .map(|u| u.input_tokens + u.output_tokens)
        .unwrap_or(0);
    Ok(AiResponse { text, tokens_used })
}

impl AnthropicService {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AiError::Fatal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AiService for AnthropicService {
    async fn ask(&self, prompt: &str, max_output_tokens: u32) -> Result<AiResponse, AiError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: max_output_tokens,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    AiError::Transient(e.to_string())
                } else {
                    AiError::Fatal(e.to_string())
                }
            })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AiError::Transient(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            let snippet: String = body.chars().take(300).collect();
            let message = format!("HTTP {}: {}", status.as_u16(), snippet);
            return Err(if is_transient_status(status) {
                AiError::Transient(message)
            } else {
                AiError::Fatal(message)
            });
        }

        let response = parse_response(&body)?;
        tracing::debug!(model = %self.model, tokens = response.tokens_used, "AI request completed");
        Ok(response)
    }
}
