use crate::conversation::{ApiMessage, Conversation};
use serde::{Deserialize, Serialize};

pub const ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const API_VERSION: &str = "2023-06-01";
pub const MAX_TOKENS: u32 = 4096;

pub const SUPPORTED_MODELS: &[&str] = &[
    "claude-opus-4-20250514",
    "claude-sonnet-4-20250514",
    "claude-haiku-4-20250414",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
];

/// Body for `POST /v1/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

pub fn build_body(conversation: &Conversation, model: Option<&str>) -> MessagesRequest {
    MessagesRequest {
        model: model.unwrap_or(SUPPORTED_MODELS[0]).to_string(),
        messages: conversation.to_api_messages(),
        max_tokens: MAX_TOKENS,
        stream: true,
        system: conversation.system_prompt().map(str::to_string),
    }
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    delta: Option<TextDelta>,
}

#[derive(Debug, Deserialize)]
struct TextDelta {
    #[serde(default)]
    text: Option<String>,
}

pub(super) fn extract_text(payload: &str) -> Option<String> {
    let event: StreamEvent = match serde_json::from_str(payload) {
        Ok(ev) => ev,
        Err(e) => {
            tracing::debug!(error = %e, "skipping unparseable event");
            return None;
        }
    };
    if event.kind != "content_block_delta" {
        return None;
    }
    event.delta?.text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use serde_json::json;

    #[test]
    fn system_prompt_goes_top_level() {
        let mut conv = Conversation::with_system_prompt("be terse");
        conv.add_message(Role::User, "hi");

        let body = serde_json::to_value(build_body(&conv, Some("claude-3-5-haiku-20241022"))).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "claude-3-5-haiku-20241022",
                "messages": [{"role": "user", "content": "hi"}],
                "max_tokens": 4096,
                "stream": true,
                "system": "be terse",
            })
        );
    }

    #[test]
    fn missing_model_falls_back_to_first_supported() {
        let conv = Conversation::new();
        let body = serde_json::to_value(build_body(&conv, None)).unwrap();
        assert_eq!(body["model"], "claude-opus-4-20250514");
        assert!(body.get("system").is_none());
    }

    #[test]
    fn only_content_block_deltas_carry_text() {
        let delta = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"x"}}"#;
        assert_eq!(extract_text(delta).as_deref(), Some("x"));

        let stop = r#"{"type":"message_delta","delta":{"stop_reason":"end_turn","text":"no"}}"#;
        assert_eq!(extract_text(stop), None);

        let tool = r#"{"type":"content_block_delta","delta":{"type":"input_json_delta","partial_json":"{"}}"#;
        assert_eq!(extract_text(tool), None);
    }
}
