use crate::conversation::{ApiMessage, Conversation};
use crate::error::ChatError;
use reqwest::Url;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const HOST_ENV: &str = "OLLAMA_HOST";

/// Body for `POST /api/chat`.
///
/// There is no default model here; an unset model is sent as `null` and the
/// server decides.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: Option<String>,
    pub messages: Vec<ApiMessage>,
    pub stream: bool,
}

pub fn build_body(conversation: &Conversation, model: Option<&str>) -> ChatRequest {
    ChatRequest {
        model: model.map(str::to_string),
        messages: conversation.to_api_messages_with_system(),
        stream: true,
    }
}

/// Server root, from `OLLAMA_HOST` or the default.
pub fn host_url() -> Result<Url, ChatError> {
    let host = std::env::var(HOST_ENV).unwrap_or_else(|_| DEFAULT_HOST.to_string());
    parse_host(&host).ok_or_else(|| ChatError::config(format!("invalid {HOST_ENV}: {host:?}")))
}

/// `OLLAMA_HOST` is commonly given as bare `host:port`, and may carry a
/// path prefix when the server sits behind a proxy. The result always ends in
/// `/` so joining `api/...` appends to the prefix.
fn parse_host(host: &str) -> Option<Url> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return None;
    }
    let with_scheme = if host.contains("://") {
        format!("{host}/")
    } else {
        format!("http://{host}/")
    };
    Url::parse(&with_scheme).ok()
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Models installed on the server via `GET /api/tags`.
///
/// Any failure (unreachable host, bad status, odd JSON) yields an empty list.
pub async fn list_models(http: &reqwest::Client, base: &Url) -> Vec<String> {
    let url = match base.join("api/tags") {
        Ok(u) => u,
        Err(e) => {
            tracing::debug!(error = %e, "bad ollama base url");
            return Vec::new();
        }
    };

    let resp = match http.get(url).send().await {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            tracing::debug!(status = %r.status(), "ollama tags request failed");
            return Vec::new();
        }
        Err(e) => {
            tracing::debug!(error = %e, "ollama unreachable");
            return Vec::new();
        }
    };

    match resp.json::<TagsResponse>().await {
        Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse ollama tags");
            Vec::new()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<LineMessage>,
}

#[derive(Debug, Deserialize)]
struct LineMessage {
    #[serde(default)]
    content: Option<String>,
}

pub(super) fn extract_text(line: &str) -> Option<String> {
    let parsed: ChatLine = match serde_json::from_str(line) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, "skipping unparseable line");
            return None;
        }
    };
    parsed.message?.content
}
