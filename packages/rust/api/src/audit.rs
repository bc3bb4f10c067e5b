//! Append-only JSON-lines audit log for compliance review.
//!
//! Every line is one event with an RFC 3339 `timestamp` and an `event_type`
//! of `query`, `retrieval` or `agent_decision`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use docintel_shared::{DocIntelError, Result};

#[derive(Debug, Serialize)]
struct AuditRecord<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: AuditEvent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
enum AuditEvent<'a> {
    Query {
        user: &'a str,
        query: &'a str,
        context: &'a Value,
    },
    Retrieval {
        query_id: &'a str,
        documents: Vec<ScoredDocument<'a>>,
    },
    AgentDecision {
        agent: &'a str,
        decision: &'a Value,
    },
}

#[derive(Debug, Serialize)]
struct ScoredDocument<'a> {
    doc_id: &'a str,
    score: f64,
}

/// Audit log writer. Safe to share between request handlers.
pub struct AuditLogger {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLogger {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocIntelError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| DocIntelError::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an incoming query with its request context.
    pub fn log_query(&self, user: &str, query: &str, context: &Value) -> Result<()> {
        self.append(AuditEvent::Query {
            user,
            query,
            context,
        })
    }

    /// Record which documents influenced an answer. `documents` and `scores`
    /// are paired positionally; extra items on either side are dropped.
    pub fn log_retrieval(&self, query_id: &str, documents: &[String], scores: &[f64]) -> Result<()> {
        let documents = documents
            .iter()
            .zip(scores)
            .map(|(doc_id, score)| ScoredDocument {
                doc_id,
                score: *score,
            })
            .collect();
        self.append(AuditEvent::Retrieval {
            query_id,
            documents,
        })
    }

    pub fn log_agent_decision(&self, agent: &str, decision: &Value) -> Result<()> {
        self.append(AuditEvent::AgentDecision { agent, decision })
    }

    fn append(&self, event: AuditEvent<'_>) -> Result<()> {
        let record = AuditRecord {
            timestamp: Utc::now().to_rfc3339(),
            event,
        };
        let line = serde_json::to_string(&record)
            .map_err(|e| DocIntelError::parse(format!("failed to encode audit event: {e}")))?;

        let mut file = self
            .file
            .lock()
            .map_err(|_| DocIntelError::Storage("audit log lock poisoned".into()))?;
        writeln!(file, "{line}").map_err(|e| DocIntelError::io(&self.path, e))?;
        file.flush().map_err(|e| DocIntelError::io(&self.path, e))
    }
}
