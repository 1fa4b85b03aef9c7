use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::llm::LlmClient;
use crate::normalizer::ResponseNormalizer;
use crate::prompt::{build_prompt, default_template};
use crate::report::{AnalysisResult, Report};
use crate::schema::SmellSchema;
use crate::store::{timestamp_now, ResponseRow, ResultStore, StoreConnector, StoreError};

/// A model queried during batch runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Provider model identifier sent with each request.
    pub id: String,
    /// Name stored in the `LLM` column.
    pub display_name: String,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Models compared by default in batch runs.
pub fn default_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::new("anthropic/claude-3-7-sonnet", "claude 3.7 sonnet"),
        ModelDescriptor::new("google/gemini-2.0-flash-001", "gemini 2.0 flash"),
        ModelDescriptor::new("openai/gpt-4-turbo", "gpt-4.1"),
        ModelDescriptor::new("deepseek/deepseek-chat-v3-0324:free", "deepseek v3"),
    ]
}

/// What to do when a response row cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistencePolicy {
    /// Log the failure and keep processing the remaining pairs.
    #[default]
    Continue,
    /// Stop the run at the first failed write.
    Abort,
}

/// Counters describing a finished batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub sources: usize,
    pub pairs: usize,
    pub provider_failures: usize,
    pub structured_replies: usize,
    pub persisted: usize,
    pub persistence_failures: usize,
}

/// Fatal batch failures. Everything else is logged and counted.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("cannot open result store: {0}")]
    Connect(#[source] StoreError),
    #[error("cannot load sources: {0}")]
    Fetch(#[source] StoreError),
    #[error("failed to persist response for source {source_id} ({model}): {error}")]
    Persist {
        source_id: i64,
        model: String,
        #[source]
        error: StoreError,
    },
    #[error("failed to close result store: {0}")]
    Close(#[source] StoreError),
}

/// Runs every stored snippet against every catalog model, one call at a time.
pub struct BatchRunner {
    client: Arc<dyn LlmClient>,
    models: Vec<ModelDescriptor>,
    schema: &'static SmellSchema,
    template: &'static str,
    normalizer: ResponseNormalizer,
    policy: PersistencePolicy,
}

impl BatchRunner {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            models: default_models(),
            schema: SmellSchema::default_schema(),
            template: default_template(),
            normalizer: ResponseNormalizer::default(),
            policy: PersistencePolicy::default(),
        }
    }

    pub fn with_models(mut self, models: Vec<ModelDescriptor>) -> Self {
        self.models = models;
        self
    }

    pub fn with_normalizer(mut self, normalizer: ResponseNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_policy(mut self, policy: PersistencePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Execute one batch run. Once the store is open, `close` runs after every
    /// completed or failed pass. A panic in the client or store skips it and
    /// leaves the connection to be released when the store is dropped.
    #[instrument(name = "batch_run", skip_all, fields(models = self.models.len()))]
    pub async fn run(&self, connector: &dyn StoreConnector) -> Result<BatchSummary, BatchError> {
        let mut store = connector.connect().await.map_err(|err| {
            error!(error = %err, "cannot open result store");
            BatchError::Connect(err)
        })?;

        let outcome = self.process(store.as_ref()).await;
        let closed = store.close().await;

        match (outcome, closed) {
            (Ok(summary), Ok(())) => {
                info!(
                    sources = summary.sources,
                    pairs = summary.pairs,
                    persisted = summary.persisted,
                    provider_failures = summary.provider_failures,
                    persistence_failures = summary.persistence_failures,
                    "batch run completed"
                );
                Ok(summary)
            }
            (Ok(_), Err(err)) => Err(BatchError::Close(err)),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                error!(error = %close_err, "failed to close result store after aborted run");
                Err(err)
            }
        }
    }

    async fn process(&self, store: &dyn ResultStore) -> Result<BatchSummary, BatchError> {
        let sources = store.fetch_sources().await.map_err(BatchError::Fetch)?;
        info!(count = sources.len(), "loaded sources");

        let mut summary = BatchSummary {
            sources: sources.len(),
            ..BatchSummary::default()
        };

        for source in &sources {
            let prompt = build_prompt(self.template, &source.code);
            info!(source_id = source.id, "processing source");

            for model in &self.models {
                summary.pairs += 1;
                // Error bodies can embed JSON, so a marker is never normalized.
                let result = match self.client.query(&prompt, &model.id).await {
                    Ok(reply) => self.normalizer.extract(&reply, self.schema),
                    Err(err) => {
                        warn!(
                            source_id = source.id,
                            model = %model.display_name,
                            error = %format!("{err:#}"),
                            "LLM query failed; storing error marker"
                        );
                        summary.provider_failures += 1;
                        AnalysisResult::new(
                            error_marker(&err),
                            Report::all_false(self.schema),
                            false,
                        )
                    }
                };
                if result.contains_structured_data() {
                    summary.structured_replies += 1;
                }
                info!(
                    source_id = source.id,
                    model = %model.display_name,
                    contains_json = result.contains_structured_data(),
                    "reply normalized"
                );

                let row = ResponseRow {
                    source_id: source.id,
                    llm: &model.display_name,
                    prompt: &prompt,
                    response: result.raw_reply_text(),
                    timestamp: timestamp_now(),
                    report: result.report(),
                };
                match store.save_response(&row).await {
                    Ok(()) => summary.persisted += 1,
                    Err(err) => {
                        error!(
                            source_id = source.id,
                            model = %model.display_name,
                            error = %err,
                            "failed to persist response"
                        );
                        summary.persistence_failures += 1;
                        if self.policy == PersistencePolicy::Abort {
                            return Err(BatchError::Persist {
                                source_id: source.id,
                                model: model.display_name.clone(),
                                error: err,
                            });
                        }
                    }
                }
            }
        }

        Ok(summary)
    }
}

/// Text stored in place of a reply when the provider call fails.
pub fn error_marker(err: &anyhow::Error) -> String {
    format!("Error: {err:#}")
}
