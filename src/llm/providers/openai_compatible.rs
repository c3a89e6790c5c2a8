use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::{sanitize_for_log, LlmProvider};
use crate::llm::types::{ChatMessage, LlmResponse};

/// Any endpoint that speaks OpenAI `chat/completions` with vision input.
pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        id: String,
        api_base: String,
        model: String,
        api_key: String,
        timeout: Duration,
    ) -> PilotResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id,
            api_base,
            model,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, prompt: &str, image_base64: &str) -> PilotResult<LlmResponse> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [ChatMessage::user_with_image(prompt, image_base64)],
            "stream": false,
        });

        tracing::debug!(provider = %self.id, model = %self.model, "sending model request");
        tracing::debug!(body = %sanitize_for_log(&body), "request body (sanitized, base64 omitted)");

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::LlmProvider(format!("{status}: {err_body}")));
        }

        let raw = response.text().await?;
        let json: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| PilotError::malformed(format!("response is not JSON: {e}"), raw.as_str()))?;
        let Some(content) = json["choices"][0]["message"]["content"].as_str() else {
            return Err(PilotError::malformed("missing choices[0].message.content", raw));
        };
        let content = content.to_string();

        tracing::info!(content_len = content.len(), "model reply received");
        Ok(LlmResponse { content })
    }
}
