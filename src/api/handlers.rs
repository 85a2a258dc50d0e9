use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::debug;

use super::server::AppContext;
use crate::db::search::Scope;
use crate::error::RagError;

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/documents", get(list_documents))
        .route(
            "/documents/:id",
            post(ingest_document).delete(delete_document),
        )
        .route("/documents/:id/status", get(document_status))
        .route("/ask", post(ask))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Maps pipeline errors onto HTTP responses with a stable JSON shape:
/// `{"error", "kind", "retryable"}`.
pub struct ApiError(RagError);

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RagError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            RagError::EmptyCorpus { .. } => StatusCode::NOT_FOUND,
            RagError::DocumentNotReady { .. } | RagError::IngestionInProgress(_) => {
                StatusCode::CONFLICT
            }
            RagError::ComposerFailure(_) => StatusCode::BAD_GATEWAY,
            RagError::EmbeddingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RagError::Index(_) | RagError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        debug!(status = %status, kind = self.0.kind(), "request failed");
        let body = json!({
            "error": self.0.to_string(),
            "kind": self.0.kind(),
            "retryable": self.0.is_retryable(),
        });
        (status, Json(body)).into_response()
    }
}

fn not_found(message: String) -> Response {
    let body = json!({
        "error": message,
        "kind": "not_found",
        "retryable": false,
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

#[derive(Deserialize)]
pub struct IngestRequest {
    pub text: String,
}

#[derive(Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// When set, restrict retrieval to this document; otherwise query the
    /// whole corpus.
    #[serde(default)]
    pub document_id: Option<String>,
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ingest_document(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<IngestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = ctx.pipeline.ingest_document(&id, &req.text).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn document_status(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match ctx.pipeline.document_status(&id).await? {
        Some(doc) => Ok(Json(doc).into_response()),
        None => Ok(not_found(format!("unknown document '{id}'"))),
    }
}

async fn list_documents(State(ctx): State<AppContext>) -> Result<impl IntoResponse, ApiError> {
    let docs = ctx.pipeline.list_documents().await?;
    Ok(Json(docs))
}

async fn delete_document(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    if ctx.pipeline.delete_document(&id).await? {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(not_found(format!("unknown document '{id}'")))
    }
}

async fn ask(
    State(ctx): State<AppContext>,
    Json(req): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = match req.document_id {
        Some(id) => Scope::Document(id),
        None => Scope::Corpus,
    };
    let answer = ctx.pipeline.ask_question(&req.question, &scope).await?;
    Ok(Json(answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::documents::DocumentState;

    fn status_of(err: RagError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_of(RagError::InvalidArgument("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(RagError::EmptyCorpus {
                scope: "corpus".into()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(RagError::DocumentNotReady {
                document_id: "doc".into(),
                state: DocumentState::Embedding,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(RagError::IngestionInProgress("doc".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(RagError::ComposerFailure("500".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(RagError::EmbeddingUnavailable("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
