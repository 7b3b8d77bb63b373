use crate::conversation::{ApiMessage, Conversation};
use serde::{Deserialize, Serialize};

pub const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

pub const SUPPORTED_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4-turbo",
    "gpt-4",
    "gpt-3.5-turbo",
    "o1",
    "o1-mini",
    "o3-mini",
];

/// Body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    pub stream: bool,
}

pub fn build_body(conversation: &Conversation, model: Option<&str>) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: model.unwrap_or(SUPPORTED_MODELS[0]).to_string(),
        messages: conversation.to_api_messages_with_system(),
        stream: true,
    }
}

#[derive(Debug, Deserialize)]
struct ChunkResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

pub(super) fn extract_text(payload: &str) -> Option<String> {
    let chunk: ChunkResponse = match serde_json::from_str(payload) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "skipping unparseable chunk");
            return None;
        }
    };
    chunk.choices.into_iter().next()?.delta?.content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use serde_json::json;

    #[test]
    fn system_prompt_becomes_leading_message() {
        let mut conv = Conversation::with_system_prompt("sys");
        conv.add_message(Role::User, "q");
        conv.add_message(Role::Assistant, "a");

        let body = serde_json::to_value(build_body(&conv, Some("gpt-4"))).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-4",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "q"},
                    {"role": "assistant", "content": "a"},
                ],
                "stream": true,
            })
        );
    }

    #[test]
    fn missing_model_falls_back_to_first_supported() {
        let body = serde_json::to_value(build_body(&Conversation::new(), None)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"], json!([]));
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn reads_first_choice_delta() {
        let chunk = r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hi"}}]}"#;
        assert_eq!(extract_text(chunk).as_deref(), Some("Hi"));
        assert_eq!(extract_text(r#"{"choices":[]}"#), None);
        assert_eq!(extract_text(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#), None);
    }
}
