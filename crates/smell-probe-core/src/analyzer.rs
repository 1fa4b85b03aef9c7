use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::llm::LlmClient;
use crate::normalizer::ResponseNormalizer;
use crate::prompt::{build_prompt, default_template};
use crate::report::{AnalysisResult, Report};
use crate::schema::SmellSchema;

/// Model queried by the on-demand analysis endpoint.
pub const DEFAULT_ANALYZE_MODEL: &str = "gpt-4.1-turbo";

/// One snippet to analyze against one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub snippet_text: String,
    pub model_id: String,
}

/// Successful single-request analysis, shaped for API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeOutcome {
    pub result: Report,
    pub raw_response: String,
    pub contains_json: bool,
}

impl From<AnalysisResult> for AnalyzeOutcome {
    fn from(result: AnalysisResult) -> Self {
        let (raw_response, result, contains_json) = result.into_parts();
        Self {
            result,
            raw_response,
            contains_json,
        }
    }
}

/// Failures surfaced by [`SmellAnalyzer::analyze`].
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("{0}")]
    Validation(String),
    #[error("LLM query failed: {0}")]
    Provider(String),
}

/// Prompt → model → normalizer pipeline for one snippet at a time.
pub struct SmellAnalyzer {
    client: Arc<dyn LlmClient>,
    schema: &'static SmellSchema,
    template: &'static str,
    normalizer: ResponseNormalizer,
    model_id: String,
}

impl SmellAnalyzer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            schema: SmellSchema::default_schema(),
            template: default_template(),
            normalizer: ResponseNormalizer::default(),
            model_id: DEFAULT_ANALYZE_MODEL.to_string(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: ResponseNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Analyze a snippet with the configured model.
    pub async fn analyze(&self, snippet: &str) -> Result<AnalysisResult, AnalyzeError> {
        let request = AnalysisRequest {
            snippet_text: snippet.to_string(),
            model_id: self.model_id.clone(),
        };
        self.analyze_request(&request).await
    }

    #[instrument(
        name = "analyze_snippet",
        skip(self, request),
        fields(model = %request.model_id, snippet_len = request.snippet_text.len())
    )]
    pub async fn analyze_request(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, AnalyzeError> {
        if request.snippet_text.trim().is_empty() {
            return Err(AnalyzeError::Validation(
                "the \"code\" field is required in the request body".to_string(),
            ));
        }

        let prompt = build_prompt(self.template, &request.snippet_text);
        let reply = self
            .client
            .query(&prompt, &request.model_id)
            .await
            .map_err(|err| {
                let message = format!("{err:#}");
                warn!(error = %message, "LLM query failed");
                AnalyzeError::Provider(message)
            })?;

        let result = self.normalizer.extract(&reply, self.schema);
        info!(
            contains_json = result.contains_structured_data(),
            flagged = result.report().flagged().count(),
            "analysis completed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        reply: Option<String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl LlmClient for RecordingClient {
        async fn query(&self, prompt: &str, model_id: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), model_id.to_string()));
            self.reply.clone().ok_or_else(|| anyhow!("connection reset"))
        }
    }

    #[tokio::test]
    async fn sends_template_and_snippet_to_fixed_model() {
        let client = Arc::new(RecordingClient {
            reply: Some(r#"{"dead_code_smell": true}"#.into()),
            ..Default::default()
        });
        let analyzer = SmellAnalyzer::new(client.clone());
        let outcome: AnalyzeOutcome = analyzer.analyze("class Foo {}").await.unwrap().into();

        assert!(outcome.contains_json);
        assert_eq!(outcome.result.get("dead_code_smell"), Some(true));
        assert_eq!(outcome.raw_response, r#"{"dead_code_smell": true}"#);

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, format!("{}class Foo {{}}", default_template()));
        assert_eq!(calls[0].1, DEFAULT_ANALYZE_MODEL);
    }

    #[tokio::test]
    async fn blank_snippet_is_rejected_before_querying() {
        let client = Arc::new(RecordingClient::default());
        let analyzer = SmellAnalyzer::new(client.clone());
        let err = analyzer.analyze("  \n").await.unwrap_err();
        assert!(matches!(err, AnalyzeError::Validation(_)));
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_failures_propagate() {
        let analyzer = SmellAnalyzer::new(Arc::new(RecordingClient::default()));
        let err = analyzer.analyze("class Foo {}").await.unwrap_err();
        match err {
            AnalyzeError::Provider(message) => assert!(message.contains("connection reset")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn model_override_is_used() {
        let client = Arc::new(RecordingClient {
            reply: Some("no json here".into()),
            ..Default::default()
        });
        let analyzer = SmellAnalyzer::new(client.clone()).with_model("openai/gpt-4.1");
        let result = analyzer.analyze("fn main() {}").await.unwrap();
        assert!(!result.contains_structured_data());
        assert_eq!(result.report().flagged().count(), 0);
        assert_eq!(client.calls.lock().unwrap()[0].1, "openai/gpt-4.1");
    }
}
