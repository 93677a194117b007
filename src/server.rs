//! HTTP surface over the query service

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use tkp_core::{
    AnswerResult, Embedder, Error, EvaluationResult, Generator, ResultSink, VectorStore,
};
use tkp_rag::QueryService;

#[derive(Debug, Deserialize)]
pub struct QuestionParams {
    pub q: String,
}

/// Error response carrying `{"error": message}`
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            Error::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::GenerationFailure { .. } => StatusCode::BAD_GATEWAY,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self.0, "request failed");
        } else {
            warn!(%status, error = %self.0, "request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Build the router for a shared query service
pub fn router<E, V, G, S>(service: Arc<QueryService<E, V, G, S>>) -> Router
where
    E: Embedder + 'static,
    V: VectorStore + 'static,
    G: Generator + 'static,
    S: ResultSink + 'static,
{
    Router::new()
        .route("/query", get(query::<E, V, G, S>))
        .route("/evaluate", get(evaluate::<E, V, G, S>))
        .route("/health", get(health))
        .with_state(service)
}

/// Serve until Ctrl-C
pub async fn serve<E, V, G, S>(service: Arc<QueryService<E, V, G, S>>, bind: SocketAddr) -> anyhow::Result<()>
where
    E: Embedder + 'static,
    V: VectorStore + 'static,
    G: Generator + 'static,
    S: ResultSink + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutting down");
        })
        .await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Unwrap the `q` parameter, reporting a missing or malformed query string as bad input
fn question(params: Result<Query<QuestionParams>, QueryRejection>) -> Result<String, ApiError> {
    params
        .map(|Query(params)| params.q)
        .map_err(|rejection| ApiError(Error::InvalidInput(rejection.body_text())))
}

async fn query<E, V, G, S>(
    State(service): State<Arc<QueryService<E, V, G, S>>>,
    params: Result<Query<QuestionParams>, QueryRejection>,
) -> Result<Json<AnswerResult>, ApiError>
where
    E: Embedder,
    V: VectorStore,
    G: Generator,
    S: ResultSink,
{
    let q = question(params)?;
    Ok(Json(service.answer(&q).await?))
}

async fn evaluate<E, V, G, S>(
    State(service): State<Arc<QueryService<E, V, G, S>>>,
    params: Result<Query<QuestionParams>, QueryRejection>,
) -> Result<Json<EvaluationResult>, ApiError>
where
    E: Embedder,
    V: VectorStore,
    G: Generator,
    S: ResultSink,
{
    let q = question(params)?;
    Ok(Json(service.evaluate(&q).await?))
}
