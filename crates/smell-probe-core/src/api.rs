use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::analyzer::{AnalyzeError, AnalyzeOutcome, SmellAnalyzer};

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<SmellAnalyzer>,
}

impl AppState {
    pub fn new(analyzer: SmellAnalyzer) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Analysis(String),
}

impl From<AnalyzeError> for ApiError {
    fn from(err: AnalyzeError) -> Self {
        match err {
            AnalyzeError::Validation(message) => ApiError::Validation(message),
            AnalyzeError::Provider(_) => ApiError::Analysis(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::Analysis(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": message }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: AnalyzeOutcome,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        ApiError::Validation(format!(
            "request body must be a JSON object with a string \"code\" field: {rejection}"
        ))
    })?;
    let code = body.code.unwrap_or_default();
    let result = state.analyzer.analyze(&code).await.map_err(|err| {
        if let AnalyzeError::Provider(_) = &err {
            error!(error = %err, "analysis failed");
        }
        ApiError::from(err)
    })?;
    Ok(Json(AnalyzeResponse {
        success: true,
        outcome: result.into(),
    }))
}

async fn status() -> Json<StatusResponse> {
    Json(StatusResponse { status: "online" })
}

/// Bind `addr` and serve the API until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let local = listener.local_addr().context("failed to read bound address")?;
    info!(%local, "smell analysis API listening; POST http://{local}/analyze");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_map_to_server_errors() {
        let err = ApiError::from(AnalyzeError::Provider("timeout".into()));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_errors_map_to_client_errors() {
        let err = ApiError::from(AnalyzeError::Validation("missing code".into()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
