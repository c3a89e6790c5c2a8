use serde::{Deserialize, Serialize};

// ── Ollama /api/chat ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaRequest {
    pub model: String,
    pub stream: bool,
    pub messages: Vec<OllamaMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaResponse {
    pub message: OllamaReply,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaReply {
    #[serde(default)]
    pub content: String,
}

impl OllamaRequest {
    /// Single-turn vision request: one user message carrying the prompt and
    /// the full-screen PNG.
    pub fn single_turn(model: &str, prompt: &str, image_base64: &str) -> Self {
        Self {
            model: model.to_string(),
            stream: false,
            messages: vec![OllamaMessage {
                role: "user".into(),
                content: prompt.to_string(),
                images: vec![image_base64.to_string()],
            }],
        }
    }
}

// ── OpenAI-compatible /chat/completions ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ChatMessage {
    pub fn user_with_image(prompt: &str, image_base64: &str) -> Self {
        Self {
            role: "user".into(),
            content: vec![
                ContentPart::Text {
                    text: prompt.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/png;base64,{image_base64}"),
                    },
                },
            ],
        }
    }
}

/// Provider-neutral reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmResponse {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_request_matches_wire_shape() {
        let req = OllamaRequest::single_turn("llava", "do it", "QUJD");
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "model": "llava",
                "stream": false,
                "messages": [
                    { "role": "user", "content": "do it", "images": ["QUJD"] }
                ]
            })
        );
    }

    #[test]
    fn ollama_response_ignores_extra_fields() {
        let body = r#"{"model":"llava","created_at":"x","message":{"role":"assistant","content":"{\"action\":\"DONE\"}"},"done":true}"#;
        let resp: OllamaResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.message.content, r#"{"action":"DONE"}"#);
    }

    #[test]
    fn openai_message_embeds_data_url() {
        let msg = ChatMessage::user_with_image("p", "AAAA");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["content"][0]["type"], "text");
        assert_eq!(v["content"][1]["type"], "image_url");
        assert_eq!(v["content"][1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }
}
