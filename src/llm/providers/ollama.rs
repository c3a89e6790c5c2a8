use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::{sanitize_for_log, LlmProvider};
use crate::llm::types::{LlmResponse, OllamaRequest, OllamaResponse};

/// Local Ollama server speaking the non-streaming `/api/chat` contract.
pub struct OllamaProvider {
    id: String,
    api_base: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(
        id: String,
        api_base: String,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> PilotResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id,
            api_base,
            model,
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, prompt: &str, image_base64: &str) -> PilotResult<LlmResponse> {
        let body = serde_json::to_value(OllamaRequest::single_turn(&self.model, prompt, image_base64))?;

        tracing::debug!(provider = %self.id, model = %self.model, "sending model request");
        tracing::debug!(body = %sanitize_for_log(&body), "request body (sanitized, base64 omitted)");

        let mut request = self.client.post(&self.api_base).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::LlmProvider(format!("{status}: {err_body}")));
        }

        let raw = response.text().await?;
        let parsed: OllamaResponse = serde_json::from_str(&raw)
            .map_err(|e| PilotError::malformed(format!("unexpected response shape: {e}"), raw.as_str()))?;
        tracing::info!(content_len = parsed.message.content.len(), "model reply received");
        Ok(LlmResponse {
            content: parsed.message.content,
        })
    }
}
