use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use smell_probe_core::analyzer::DEFAULT_ANALYZE_MODEL;
use smell_probe_core::batch::default_models;
use smell_probe_core::{
    DatabaseSettings, ExtractionOptions, LlmSettings, ModelDescriptor, PersistencePolicy,
};

const PORT_ENV: &str = "PORT";
const DEFAULT_PORT: u16 = 3000;

/// Settings resolved from the environment, optionally overridden by a config file.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub analyze_model: String,
    pub port: u16,
    pub database: DatabaseSettings,
    pub extraction: ExtractionOptions,
    pub models: Vec<ModelDescriptor>,
    pub persistence: PersistencePolicy,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Some(path) = path {
            let file = FileConfig::load(path)?;
            config.apply(file)?;
        }
        Ok(config)
    }

    fn from_env() -> Result<Self> {
        let port = match std::env::var(PORT_ENV) {
            Ok(value) if !value.trim().is_empty() => value
                .trim()
                .parse::<u16>()
                .with_context(|| format!("{PORT_ENV} must be a valid TCP port"))?,
            _ => DEFAULT_PORT,
        };
        Ok(Self {
            llm: LlmSettings::from_env()?,
            analyze_model: DEFAULT_ANALYZE_MODEL.to_string(),
            port,
            database: DatabaseSettings::from_env(),
            extraction: ExtractionOptions::default(),
            models: default_models(),
            persistence: PersistencePolicy::default(),
        })
    }

    fn apply(&mut self, file: FileConfig) -> Result<()> {
        let FileConfig {
            llm,
            server,
            database,
            extraction,
            batch,
        } = file;

        if let Some(provider) = llm.provider {
            self.llm.provider = provider;
        }
        if let Some(api_key) = llm.api_key {
            self.llm.api_key = api_key;
        }
        if let Some(endpoint) = llm.endpoint {
            self.llm.endpoint = Some(endpoint);
        }
        if let Some(timeout) = llm.timeout {
            let duration = humantime::parse_duration(&timeout)
                .with_context(|| format!("invalid llm.timeout `{timeout}`"))?;
            self.llm.timeout_secs = Some(duration.as_secs().max(1));
        }
        if let Some(max_retries) = llm.max_retries {
            self.llm.max_retries = max_retries;
        }
        if let Some(model) = llm.analyze_model {
            self.analyze_model = model;
        }

        if let Some(port) = server.port {
            self.port = port;
        }

        if let Some(path) = database.path {
            self.database.path = path;
        }
        if let Some(url) = database.url {
            self.database.url = Some(url);
        }
        if let Some(token) = database.auth_token {
            self.database.auth_token = Some(token);
        }

        if let Some(extraction) = extraction {
            self.extraction = extraction;
        }
        if let Some(models) = batch.models {
            anyhow::ensure!(!models.is_empty(), "batch.models must list at least one model");
            self.models = models;
        }
        if let Some(persistence) = batch.persistence {
            self.persistence = persistence;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    llm: LlmSection,
    server: ServerSection,
    database: DatabaseSection,
    extraction: Option<ExtractionOptions>,
    batch: BatchSection,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .and_then(|cfg| cfg.try_deserialize::<FileConfig>())
            .with_context(|| format!("failed to load config file {}", path.display()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LlmSection {
    provider: Option<String>,
    api_key: Option<String>,
    endpoint: Option<String>,
    /// Human-friendly duration such as `30s` or `2m`.
    timeout: Option<String>,
    max_retries: Option<u32>,
    analyze_model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerSection {
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DatabaseSection {
    path: Option<String>,
    url: Option<String>,
    auth_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BatchSection {
    models: Option<Vec<ModelDescriptor>>,
    persistence: Option<PersistencePolicy>,
}
