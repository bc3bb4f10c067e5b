//! HTTP API for the document intelligence workspace.
//!
//! Routes:
//! - `GET /health`: liveness and version
//! - `POST /query`: bearer-authenticated query, audit-logged
//! - `GET /catalog`: the current dataset catalog with totals

pub mod audit;
pub mod auth;
pub mod error;
pub mod query;
mod routes;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use docintel_shared::{ApiConfig, DocIntelError, Result};

pub use audit::AuditLogger;
pub use auth::{AuthenticatedUser, Authenticator};
pub use error::ApiError;
pub use query::{CatalogQueryEngine, Citation, QueryEngine, QueryRequest, QueryResponse};
pub use routes::{CatalogResponse, HealthResponse};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Workspace root holding `data/raw`.
    pub root: PathBuf,
    pub engine: Arc<dyn QueryEngine>,
    pub auth: Arc<Authenticator>,
    pub audit: Arc<AuditLogger>,
}

impl AppState {
    /// State for `root` using the catalog engine. The audit log path in
    /// `config` is resolved against `root` when relative.
    pub fn new(root: &Path, config: &ApiConfig, token: Option<String>) -> Result<Self> {
        let audit = AuditLogger::open(&root.join(&config.audit_log))?;
        let auth = Authenticator::new(token, config.default_role.clone());
        if !auth.enforcing() {
            warn!(
                token_env = %config.token_env,
                "no API token configured; accepting any bearer token"
            );
        }

        Ok(Self {
            root: root.to_path_buf(),
            engine: Arc::new(CatalogQueryEngine::new(root)),
            auth: Arc::new(auth),
            audit: Arc::new(audit),
        })
    }

    pub fn with_engine(mut self, engine: Arc<dyn QueryEngine>) -> Self {
        self.engine = engine;
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/query", post(routes::query))
        .route("/catalog", get(routes::catalog))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| DocIntelError::Network(format!("failed to bind {addr}: {e}")))?;
    info!(%addr, audit_log = %state.audit.path().display(), "API listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| DocIntelError::Network(format!("server error: {e}")))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::EngineAnswer;
    use serde_json::{Value, json};
    use uuid::Uuid;

    struct FailingEngine;

    impl QueryEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }

        fn answer(&self, _request: &QueryRequest) -> Result<EngineAnswer> {
            Err(DocIntelError::Storage("index unavailable".into()))
        }
    }

    fn temp_root() -> PathBuf {
        let root = std::env::temp_dir().join(format!("docintel-api-{}", Uuid::now_v7()));
        let raw = root.join("data/raw");
        std::fs::create_dir_all(&raw).unwrap();
        std::fs::copy(
            "../../../fixtures/json/sources_metadata.fixture.json",
            raw.join("sources_metadata.json"),
        )
        .unwrap();
        root
    }

    async fn spawn(state: AppState) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let app = build_router(state);
        tokio::spawn(async move { axum::serve(listener, app).await.expect("serve") });
        format!("http://{addr}")
    }

    fn state(root: &Path, token: Option<&str>) -> AppState {
        AppState::new(root, &ApiConfig::default(), token.map(String::from)).unwrap()
    }

    #[tokio::test]
    async fn health_reports_version() {
        let root = temp_root();
        let base = spawn(state(&root, None)).await;

        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn query_answers_and_audits() {
        let root = temp_root();
        let base = spawn(state(&root, Some("s3cret"))).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/query"))
            .bearer_auth("s3cret")
            .json(&json!({"query": "Basel III reforms", "top_k": 2}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: QueryResponse = resp.json().await.unwrap();
        assert_eq!(body.citations[0].doc_id, "basel3_finalising_reforms.pdf");
        assert!(body.citations.len() <= 2);
        assert!(body.confidence > 0.0);
        assert_eq!(body.compliance_risk_level, "LOW");

        let log = std::fs::read_to_string(root.join("logs/audit.log")).unwrap();
        let events: Vec<Value> = log.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        let kinds: Vec<&str> = events.iter().map(|e| e["event_type"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["query", "retrieval", "agent_decision"]);
        assert_eq!(events[0]["user"], "analyst");
        assert_eq!(events[2]["agent"], "catalog");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn query_requires_valid_bearer_token() {
        let root = temp_root();
        let base = spawn(state(&root, Some("s3cret"))).await;
        let client = reqwest::Client::new();
        let body = json!({"query": "gdpr"});

        let missing = client
            .post(format!("{base}/query"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 401);
        assert_eq!(missing.headers()["www-authenticate"], "Bearer");

        let wrong = client
            .post(format!("{base}/query"))
            .bearer_auth("guess")
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(wrong.status(), 401);
        let detail: Value = wrong.json().await.unwrap();
        assert!(detail["detail"].as_str().unwrap().contains("invalid token"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn authentication_runs_before_body_parsing() {
        let root = temp_root();
        let base = spawn(state(&root, Some("s3cret"))).await;
        let client = reqwest::Client::new();
        let url = format!("{base}/query");

        let no_body = client.post(&url).send().await.unwrap();
        let truncated = client
            .post(&url)
            .header("content-type", "application/json")
            .body("{")
            .send()
            .await
            .unwrap();
        let ill_typed = client
            .post(&url)
            .json(&json!({"query": "x", "top_k": -1}))
            .send()
            .await
            .unwrap();

        for resp in [no_body, truncated, ill_typed] {
            assert_eq!(resp.status(), 401);
            assert_eq!(resp.headers()["www-authenticate"], "Bearer");
            let body: Value = resp.json().await.unwrap();
            assert!(body["detail"].is_string());
        }

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn malformed_body_is_unprocessable_with_detail() {
        let root = temp_root();
        let base = spawn(state(&root, Some("s3cret"))).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/query"))
            .bearer_auth("s3cret")
            .json(&json!({"query": "x", "top_k": -1}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
        let body: Value = resp.json().await.unwrap();
        assert!(body["detail"].is_string());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn empty_query_is_unprocessable() {
        let root = temp_root();
        let base = spawn(state(&root, None)).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/query"))
            .bearer_auth("dev")
            .json(&json!({"query": "   "}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn engine_failure_returns_detail() {
        let root = temp_root();
        let base = spawn(state(&root, None).with_engine(Arc::new(FailingEngine))).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/query"))
            .bearer_auth("dev")
            .json(&json!({"query": "gdpr"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["detail"], "storage error: index unavailable");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn catalog_lists_sections_and_summary() {
        let root = temp_root();
        let base = spawn(state(&root, None)).await;

        let body: Value = reqwest::get(format!("{base}/catalog"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["summary"]["total_documents"], 3);
        assert_eq!(body["summary"]["by_type"]["regulation"], 2);
        assert_eq!(body["sections"][0]["source"], "EUR-Lex");

        let _ = std::fs::remove_dir_all(&root);
    }
}
