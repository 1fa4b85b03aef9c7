mod openrouter;
mod settings;

use std::{fmt, str::FromStr, sync::Arc};

use anyhow::{bail, Result};
use async_trait::async_trait;

pub use openrouter::OpenRouterClient;
pub use settings::LlmSettings;

/// Client abstraction for sending a prompt to a chat-completion model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send `prompt` as a single user message to `model_id` and return the
    /// first completion's text verbatim.
    async fn query(&self, prompt: &str, model_id: &str) -> Result<String>;
}

/// Offline client that answers every prompt with an empty JSON object.
#[derive(Debug, Default, Clone)]
pub struct NoopLlmClient;

#[async_trait]
impl LlmClient for NoopLlmClient {
    async fn query(&self, _prompt: &str, model_id: &str) -> Result<String> {
        tracing::debug!(%model_id, "noop provider answering with empty object");
        Ok("{}".to_string())
    }
}

/// Supported provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenRouter,
    Noop,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(Self::OpenRouter),
            "noop" => Ok(Self::Noop),
            other => bail!("unsupported LLM provider `{other}` (expected openrouter or noop)"),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenRouter => f.write_str("openrouter"),
            Self::Noop => f.write_str("noop"),
        }
    }
}

/// Build the client selected by `settings.provider`.
pub fn build_client(settings: &LlmSettings) -> Result<Arc<dyn LlmClient>> {
    match settings.provider.parse::<ProviderKind>()? {
        ProviderKind::OpenRouter => Ok(Arc::new(OpenRouterClient::new(settings)?)),
        ProviderKind::Noop => Ok(Arc::new(NoopLlmClient)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names() {
        assert_eq!(
            " OpenRouter ".parse::<ProviderKind>().unwrap(),
            ProviderKind::OpenRouter
        );
        assert_eq!("noop".parse::<ProviderKind>().unwrap(), ProviderKind::Noop);
        let err = "azure".parse::<ProviderKind>().unwrap_err();
        assert!(err.to_string().contains("azure"));
    }

    #[tokio::test]
    async fn noop_client_returns_empty_object() {
        let reply = NoopLlmClient.query("prompt", "any-model").await.unwrap();
        assert_eq!(reply, "{}");
    }

    #[test]
    fn build_client_requires_key_for_openrouter() {
        let settings = LlmSettings {
            provider: "openrouter".into(),
            api_key: String::new(),
            endpoint: None,
            timeout_secs: None,
            max_retries: 0,
        };
        let err = build_client(&settings).err().expect("missing key should error");
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));

        let noop = LlmSettings {
            provider: "noop".into(),
            ..settings
        };
        assert!(build_client(&noop).is_ok());
    }
}
