use crate::error::ChatError;
use crate::provider::{self, Provider, ProviderKind};
use anyhow::Context;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One layer of `config.toml`. Every key is optional; layers are merged.
#[derive(Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Provider identifier: "anthropic", "open_ai" or "ollama".
    pub provider: Option<String>,

    pub api_key: Option<String>,

    /// Model identifier; the provider's default when unset.
    pub model: Option<String>,

    pub system_prompt: Option<String>,

    /// Override for the provider's server root.
    pub base_url: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Config {
    /// Load config if the file exists, otherwise return Ok(None).
    pub fn load_optional(path: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("failed to read config: {}", path.display()))
            }
        };

        let s = String::from_utf8(bytes).context("config is not valid UTF-8")?;
        let cfg: Config = toml::from_str(&s)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
        Ok(Some(cfg))
    }

    /// Load each existing file in order; later files win key by key.
    pub fn load_layered<P: AsRef<Path>>(paths: &[P]) -> anyhow::Result<Self> {
        let mut merged = Config::default();
        for path in paths {
            if let Some(layer) = Self::load_optional(path)? {
                tracing::debug!(path = %path.as_ref().display(), "loaded config layer");
                merged = merged.merge(layer);
            }
        }
        Ok(merged)
    }

    /// Keys set in `over` replace ours.
    pub fn merge(self, over: Config) -> Config {
        Config {
            provider: over.provider.or(self.provider),
            api_key: over.api_key.or(self.api_key),
            model: over.model.or(self.model),
            system_prompt: over.system_prompt.or(self.system_prompt),
            base_url: over.base_url.or(self.base_url),
        }
    }
}

/// Validated, explicitly passed context for building a provider.
#[derive(Clone)]
pub struct Settings {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub base_url: Option<Url>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .finish()
    }
}

impl Settings {
    /// Checks everything that can be checked without the network.
    pub fn from_config(cfg: &Config) -> Result<Self, ChatError> {
        let name = cfg
            .provider
            .as_deref()
            .ok_or_else(|| ChatError::config("Provider is not configured"))?;
        let provider = provider::lookup(name)?;

        let api_key = cfg.api_key.clone().filter(|k| !k.trim().is_empty());
        if provider.requires_api_key() && api_key.is_none() {
            return Err(ChatError::config("API key is not configured"));
        }

        let base_url = cfg
            .base_url
            .as_deref()
            .map(|u| Url::parse(u).map_err(|e| ChatError::config(format!("invalid base_url {u:?}: {e}"))))
            .transpose()?;

        Ok(Self {
            provider,
            api_key,
            model: cfg.model.clone().filter(|m| !m.trim().is_empty()),
            system_prompt: cfg.system_prompt.clone(),
            base_url,
        })
    }

    pub fn build_provider(&self, http: &reqwest::Client) -> Result<Provider, ChatError> {
        let p = Provider::new(http.clone(), self.provider, self.api_key.clone(), self.model.clone())?;
        match &self.base_url {
            Some(base) => p.with_base_url(base),
            None => Ok(p),
        }
    }
}

/// A configured model must be one the provider lists.
pub async fn validate_model(provider: &Provider) -> Result<(), ChatError> {
    let Some(model) = provider.model() else {
        return Ok(());
    };
    let supported = provider.supported_models().await;
    if supported.iter().any(|m| m == model) {
        return Ok(());
    }
    Err(ChatError::config(format!(
        "Unsupported model '{model}' for provider '{}'. Supported models: {}",
        provider.name(),
        supported.join(", ")
    )))
}
