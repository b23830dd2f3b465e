//! Blocking HTTP transport for OpenAI-compatible chat-completion APIs.

use super::{ChatRequest, ChatTransport, TransportError};
use crate::error::{Error, Result};
use serde_json::json;
use std::time::Duration;

/// Where and as whom to talk to the classifier provider.
#[derive(Clone, Debug)]
pub struct ClassifierEndpoint {
    /// API root, e.g. `https://api.mistral.ai`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

pub struct HttpChatTransport {
    client: reqwest::blocking::Client,
    endpoint: ClassifierEndpoint,
}

impl HttpChatTransport {
    pub fn new(endpoint: ClassifierEndpoint) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| Error::Transport(err.to_string()))?;
        Ok(Self { client, endpoint })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.endpoint.base_url.trim_end_matches('/')
        )
    }
}

impl ChatTransport for HttpChatTransport {
    fn complete(&self, request: &ChatRequest) -> std::result::Result<String, TransportError> {
        let body = json!({
            "model": self.endpoint.model,
            "temperature": request.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_message },
            ],
        });

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.endpoint.api_key)
            .json(&body)
            .send()
            .map_err(|err| TransportError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let payload: serde_json::Value = response
            .json()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(TransportError::Empty)?;
        if content.is_empty() {
            return Err(TransportError::Empty);
        }
        Ok(content.to_string())
    }
}
