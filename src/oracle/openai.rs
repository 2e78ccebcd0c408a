//! OpenAI-compatible chat-completions client

use crate::config::OracleConfig;
use crate::error::{OracleError, Result};
use crate::oracle::{ChatMessage, Oracle, ResponseFormat};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Oracle backed by a `/chat/completions` endpoint
pub struct OpenAiOracle {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OpenAiOracle {
    /// Build a client from config; fails without an API key
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(OracleError::MissingApiKey)?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Model name requests are sent with
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, messages: &[ChatMessage], format: ResponseFormat) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if format == ResponseFormat::Json {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    #[instrument(skip(self, messages), fields(model = %self.model))]
    async fn complete(&self, messages: &[ChatMessage], format: ResponseFormat) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages, format))
            .send()
            .await
            .map_err(|e| OracleError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| OracleError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error")
                .to_string();
            warn!("Oracle API error ({}): {}", status, message);
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(OracleError::EmptyReply)?;

        debug!("Oracle replied with {} chars", content.len());
        Ok(content.to_string())
    }
}
