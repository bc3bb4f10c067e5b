//! Route handlers for `/health`, `/catalog` and `/query`.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use docintel_catalog::{CatalogSection, CatalogSummary};

use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::query::{QueryRequest, QueryResponse, load_catalog};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub sections: Vec<CatalogSection>,
    pub summary: CatalogSummary,
}

pub(crate) async fn catalog(State(state): State<AppState>) -> Result<Json<CatalogResponse>, ApiError> {
    let catalog = load_catalog(&state.root)?;
    let summary = catalog.summary();
    Ok(Json(CatalogResponse {
        sections: catalog.sections,
        summary,
    }))
}

pub(crate) async fn query(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::unprocessable(e.body_text()))?;

    if request.query.trim().is_empty() {
        return Err(ApiError::unprocessable("query must not be empty"));
    }
    if request.top_k == 0 {
        return Err(ApiError::unprocessable("top_k must be at least 1"));
    }

    let query_id = Uuid::now_v7().to_string();
    info!(%query_id, role = %user.role, query = %request.query, "query received");
    state.audit.log_query(
        &user.role,
        &request.query,
        &json!({
            "query_id": query_id,
            "top_k": request.top_k,
            "include_compliance_check": request.include_compliance_check,
        }),
    )?;

    let answer = state.engine.answer(&request).map_err(|e| {
        error!(%query_id, error = %e, "query failed");
        ApiError::internal(e.to_string())
    })?;

    let (documents, scores): (Vec<String>, Vec<f64>) = answer.scores.iter().cloned().unzip();
    state.audit.log_retrieval(&query_id, &documents, &scores)?;
    state.audit.log_agent_decision(
        state.engine.name(),
        &json!({
            "query_id": query_id,
            "confidence": answer.response.confidence,
            "citations": answer.response.citations.len(),
            "compliance_risk_level": answer.response.compliance_risk_level,
        }),
    )?;

    info!(
        %query_id,
        confidence = answer.response.confidence,
        citations = answer.response.citations.len(),
        "query answered"
    );

    Ok(Json(answer.response))
}
