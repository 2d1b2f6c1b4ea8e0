//! HTTP completion client for Responses-style JSON APIs.
//!
//! The response `id` is handed back as the continuity token and sent as
//! `previous_response_id` on follow-up calls, so the provider keeps the
//! reasoning context across refinement and monitoring checkpoints.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{Completion, CompletionClient, CompletionRequest};
use crate::types::{CompletionConfig, Error, Result};

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    input: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    output_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug)]
pub struct HttpCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    pub fn new(config: &CompletionConfig, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::internal(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Build from config, reading the API key from `config.api_key_env`.
    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            warn!(env = %config.api_key_env, "no completion API key set");
        }
        Self::new(config, api_key)
    }

    fn build_body<'a>(&'a self, request: &'a CompletionRequest) -> ApiRequest<'a> {
        let mut content = vec![json!({"type": "input_text", "text": request.prompt})];
        if let Some(image) = &request.image {
            content.push(json!({"type": "input_image", "image_url": image.to_url()}));
        }
        ApiRequest {
            model: &self.model,
            input: vec![json!({"role": "user", "content": content})],
            previous_response_id: request.continuity_token.as_deref(),
            text: request
                .response_shape
                .map(|_| json!({"format": {"type": "json_object"}})),
        }
    }
}

fn classify_status(status: StatusCode, body: &str) -> Error {
    let snippet: String = body.chars().take(200).collect();
    match status {
        StatusCode::UNAUTHORIZED
        | StatusCode::PAYMENT_REQUIRED
        | StatusCode::FORBIDDEN
        | StatusCode::TOO_MANY_REQUESTS => {
            Error::auth_quota(format!("HTTP {}: {}", status.as_u16(), snippet))
        }
        _ => Error::completion(format!("HTTP {}: {}", status.as_u16(), snippet)),
    }
}

fn extract_text(response: &ApiResponse) -> Option<String> {
    let parts: Vec<&str> = response
        .output
        .iter()
        .flat_map(|item| item.content.iter())
        .filter(|part| part.kind == "output_text")
        .filter_map(|part| part.text.as_deref())
        .collect();
    if !parts.is_empty() {
        return Some(parts.join(""));
    }
    response.output_text.clone()
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let url = format!("{}/responses", self.endpoint);
        let body = self.build_body(&request);

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(format!("completion request: {}", e))
            } else {
                Error::completion(format!("completion request: {}", e))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::completion(format!("reading completion body: {}", e)))?;

        if !status.is_success() {
            warn!(status = %status, "completion API error response");
            return Err(classify_status(status, &text));
        }

        let parsed: ApiResponse = serde_json::from_str(&text)
            .map_err(|e| Error::completion(format!("malformed completion envelope: {}", e)))?;
        let output = extract_text(&parsed)
            .ok_or_else(|| Error::completion("completion envelope has no output text"))?;

        debug!(chars = output.len(), has_token = parsed.id.is_some(), "completion_received");
        Ok(Completion {
            text: output,
            continuity_token: parsed.id,
        })
    }
}
