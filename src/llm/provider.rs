use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::llm::types::LlmResponse;

/// Unified vision-model provider trait. All adapters implement this trait.
/// New providers only need to implement this trait and register in config.toml.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider's identifier (matches config.toml key).
    fn name(&self) -> &str;

    /// One non-streaming completion for a prompt plus a single base64 PNG.
    /// A transport failure or non-success status is an error.
    async fn chat(&self, prompt: &str, image_base64: &str) -> PilotResult<LlmResponse>;
}

/// Replaces inline image payloads in a request body before it is logged.
pub(crate) fn sanitize_for_log(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            if let Some(images) = msg.get_mut("images").and_then(|i| i.as_array_mut()) {
                for img in images {
                    *img = serde_json::Value::String("<omitted_base64_image>".to_string());
                }
            }
            if let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) {
                for part in parts {
                    if let Some(url) = part.get_mut("image_url").and_then(|u| u.get_mut("url")) {
                        *url = serde_json::Value::String("<omitted_base64_image>".to_string());
                    }
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizer_hides_both_image_shapes() {
        let body = serde_json::json!({
            "messages": [
                { "role": "user", "content": "x", "images": ["SECRETPNG"] },
                { "role": "user", "content": [
                    { "type": "image_url", "image_url": { "url": "data:image/png;base64,SECRETPNG" } }
                ]}
            ]
        });
        let logged = sanitize_for_log(&body);
        assert!(!logged.contains("SECRETPNG"));
        assert_eq!(logged.matches("<omitted_base64_image>").count(), 2);
    }
}
