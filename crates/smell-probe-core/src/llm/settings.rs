use anyhow::{Context, Result};
use std::collections::HashMap;

/// Environment-driven configuration required for LLM clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub provider: String,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: u32,
}

impl LlmSettings {
    pub(crate) const PROVIDER_ENV: &'static str = "SMELL_PROBE_PROVIDER";
    pub(crate) const API_KEY_ENV: &'static str = "OPENROUTER_API_KEY";
    pub(crate) const ENDPOINT_ENV: &'static str = "SMELL_PROBE_ENDPOINT";
    pub(crate) const TIMEOUT_ENV: &'static str = "SMELL_PROBE_TIMEOUT_SECS";
    pub(crate) const RETRIES_ENV: &'static str = "SMELL_PROBE_MAX_RETRIES";

    /// Load settings from environment variables.
    ///
    /// * `SMELL_PROBE_PROVIDER`: Provider identifier (default: `openrouter`).
    /// * `OPENROUTER_API_KEY`: API key; checked when the OpenRouter client is built.
    /// * `SMELL_PROBE_ENDPOINT`: Optional base URL override.
    /// * `SMELL_PROBE_TIMEOUT_SECS` / `SMELL_PROBE_MAX_RETRIES`: request tuning.
    pub fn from_env() -> Result<Self> {
        Self::from_map(std::env::vars().collect())
    }

    fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        let non_blank = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let provider = non_blank(Self::PROVIDER_ENV).unwrap_or_else(|| "openrouter".to_string());
        let api_key = non_blank(Self::API_KEY_ENV).unwrap_or_default();
        let endpoint = non_blank(Self::ENDPOINT_ENV);
        let timeout_secs = non_blank(Self::TIMEOUT_ENV)
            .map(|v| {
                v.parse::<u64>()
                    .with_context(|| format!("{} must be a whole number of seconds", Self::TIMEOUT_ENV))
            })
            .transpose()?;
        let max_retries = non_blank(Self::RETRIES_ENV)
            .map(|v| {
                v.parse::<u32>()
                    .with_context(|| format!("{} must be a non-negative integer", Self::RETRIES_ENV))
            })
            .transpose()?
            .unwrap_or(0);

        Ok(Self {
            provider,
            api_key,
            endpoint,
            timeout_secs,
            max_retries,
        })
    }
}
