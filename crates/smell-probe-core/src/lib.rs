pub mod analyzer;
pub mod api;
pub mod batch;
pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod report;
pub mod schema;
pub mod store;

pub use analyzer::{AnalysisRequest, AnalyzeError, AnalyzeOutcome, SmellAnalyzer};
pub use batch::{BatchError, BatchRunner, BatchSummary, ModelDescriptor, PersistencePolicy};
pub use llm::{LlmClient, LlmSettings};
pub use normalizer::{
    extract_report, CoercionPolicy, ExtractionOptions, ResponseNormalizer, SpanStrategy,
};
pub use report::{AnalysisResult, Report};
pub use schema::{SchemaError, SmellSchema};
pub use store::{DatabaseSettings, LibSqlConnector, ResultStore, StoreConnector, StoreError};
