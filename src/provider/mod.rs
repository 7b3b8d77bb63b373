pub mod anthropic;
pub mod decode;
pub mod ollama;
pub mod openai;
pub mod transport;

use crate::conversation::Conversation;
use crate::error::ChatError;
use decode::{Decoder, Dialect, EventDecoder, LineDecoder};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
pub use transport::FragmentSink;

/// Closed set of supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "open_ai",
            ProviderKind::Ollama => "ollama",
        }
    }

    pub fn requires_api_key(self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }

    /// Fixed model list, or `None` when the server has to be asked.
    pub fn static_models(self) -> Option<&'static [&'static str]> {
        match self {
            ProviderKind::Anthropic => Some(anthropic::SUPPORTED_MODELS),
            ProviderKind::OpenAi => Some(openai::SUPPORTED_MODELS),
            ProviderKind::Ollama => None,
        }
    }

    /// Environment variable consulted for a credential.
    pub fn api_key_env(self) -> Option<&'static str> {
        match self {
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }

    /// Where chat requests go when no base URL override is configured.
    pub fn default_endpoint(self) -> Result<Url, ChatError> {
        let parsed = match self {
            ProviderKind::Anthropic => Url::parse(anthropic::ENDPOINT),
            ProviderKind::OpenAi => Url::parse(openai::ENDPOINT),
            ProviderKind::Ollama => return ollama::host_url()?.join("api/chat").map_err(bad_url),
        };
        parsed.map_err(bad_url)
    }

    fn endpoint_path(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "v1/messages",
            ProviderKind::OpenAi => "v1/chat/completions",
            ProviderKind::Ollama => "api/chat",
        }
    }

    fn decoder(self) -> Decoder {
        match self {
            ProviderKind::Anthropic => Decoder::Events(EventDecoder::new(Dialect::AnthropicDelta)),
            ProviderKind::OpenAi => Decoder::Events(EventDecoder::new(Dialect::OpenAiChoice)),
            ProviderKind::Ollama => Decoder::Lines(LineDecoder::new(Dialect::OllamaMessage)),
        }
    }
}

fn bad_url(e: impl fmt::Display) -> ChatError {
    ChatError::config(format!("invalid endpoint URL: {e}"))
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(ProviderKind::Anthropic),
            "open_ai" | "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(ChatError::config(format!("Unknown provider: {other}"))),
        }
    }
}

/// Registry lookup: provider identifier to concrete backend.
///
/// Unknown identifiers are a configuration error; there is no fallback.
pub fn lookup(name: &str) -> Result<ProviderKind, ChatError> {
    name.parse()
}

/// Request payload for whichever backend was selected.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RequestBody {
    Anthropic(anthropic::MessagesRequest),
    OpenAi(openai::ChatCompletionRequest),
    Ollama(ollama::ChatRequest),
}

/// A resolved backend: request builder, stream decoder and transport
/// bundled with the credential and model they run with.
#[derive(Debug, Clone)]
pub struct Provider {
    http: reqwest::Client,
    kind: ProviderKind,
    api_key: Option<String>,
    model: Option<String>,
    endpoint: Url,
}

impl Provider {
    pub fn new(
        http: reqwest::Client,
        kind: ProviderKind,
        api_key: Option<String>,
        model: Option<String>,
    ) -> Result<Self, ChatError> {
        let endpoint = kind.default_endpoint()?;
        Ok(Self {
            http,
            kind,
            api_key,
            model,
            endpoint,
        })
    }

    /// Point the provider at another server root (proxies, tests).
    pub fn with_base_url(mut self, base: &Url) -> Result<Self, ChatError> {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        self.endpoint = base.join(self.kind.endpoint_path()).map_err(bad_url)?;
        Ok(self)
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Server root derived from the chat endpoint.
    fn base_url(&self) -> Url {
        let mut base = self.endpoint.clone();
        base.set_query(None);
        let root = self
            .endpoint
            .path()
            .strip_suffix(self.kind.endpoint_path())
            .unwrap_or("/")
            .to_string();
        base.set_path(&root);
        base
    }

    pub fn build_body(&self, conversation: &Conversation) -> RequestBody {
        let model = self.model.as_deref();
        match self.kind {
            ProviderKind::Anthropic => RequestBody::Anthropic(anthropic::build_body(conversation, model)),
            ProviderKind::OpenAi => RequestBody::OpenAi(openai::build_body(conversation, model)),
            ProviderKind::Ollama => RequestBody::Ollama(ollama::build_body(conversation, model)),
        }
    }

    fn headers(&self) -> Result<HeaderMap, ChatError> {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let key = self.api_key.as_deref().unwrap_or_default();
        match self.kind {
            ProviderKind::Anthropic => {
                h.insert(HeaderName::from_static("x-api-key"), header_value(key)?);
                h.insert(
                    HeaderName::from_static("anthropic-version"),
                    HeaderValue::from_static(anthropic::API_VERSION),
                );
            }
            ProviderKind::OpenAi => {
                h.insert(AUTHORIZATION, header_value(&format!("Bearer {key}"))?);
            }
            ProviderKind::Ollama => {}
        }
        Ok(h)
    }

    /// Send one turn and stream the reply.
    ///
    /// Every fragment is handed to `on_fragment` (if any) as soon as it is
    /// decoded; the return value is the full reply either way. Dropping the
    /// future cancels the request and discards partial text.
    pub async fn chat(
        &self,
        conversation: &Conversation,
        on_fragment: Option<FragmentSink<'_>>,
    ) -> Result<String, ChatError> {
        let body = self.build_body(conversation);
        let headers = self.headers()?;
        tracing::debug!(provider = %self.kind, model = ?self.model, turns = conversation.messages().len(), "chat");

        transport::post_stream(
            &self.http,
            self.endpoint.clone(),
            headers,
            &body,
            self.kind.decoder(),
            on_fragment,
        )
        .await
    }

    /// Models this backend accepts. Ollama is asked live and yields an empty
    /// list when unreachable.
    pub async fn supported_models(&self) -> Vec<String> {
        match self.kind.static_models() {
            Some(models) => models.iter().map(|m| m.to_string()).collect(),
            None => ollama::list_models(&self.http, &self.base_url()).await,
        }
    }
}

fn header_value(v: &str) -> Result<HeaderValue, ChatError> {
    HeaderValue::from_str(v).map_err(|_| ChatError::config("credential is not a valid header value"))
}
