//! libSQL storage layer for the document index (offline mode).
//!
//! The [`Storage`] struct wraps a local libSQL database holding one row per
//! downloaded document and the history of download runs.
//!
//! **Access rules:**
//! - CLI download runs: read-write (sole writer) via [`Storage::open`]
//! - API server: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::Utc;
use docintel_shared::{DocIntelError, DocumentMetadata, Result};
use libsql::{Connection, Database, params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Columns selected for every document query, in `row_to_document` order.
const DOCUMENT_COLUMNS: &str = "filename, filepath, url, doc_type, source, file_hash, \
     file_size_mb, download_date, cached, extra_json";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocIntelError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DocIntelError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DocIntelError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DocIntelError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DocIntelError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        DocIntelError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(DocIntelError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Document operations
    // -----------------------------------------------------------------------

    /// Upsert a document (insert or update on conflict by `filename`).
    pub async fn upsert_document(&self, doc: &DocumentMetadata) -> Result<()> {
        self.check_writable()?;
        let extra = serde_json::to_string(&ExtraFields::from(doc))
            .map_err(|e| DocIntelError::Storage(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO documents (filename, filepath, url, doc_type, source, file_hash,
                                        file_size_mb, download_date, cached, extra_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(filename) DO UPDATE SET
                   filepath = excluded.filepath,
                   url = excluded.url,
                   doc_type = excluded.doc_type,
                   source = excluded.source,
                   file_hash = excluded.file_hash,
                   file_size_mb = excluded.file_size_mb,
                   download_date = excluded.download_date,
                   cached = excluded.cached,
                   extra_json = excluded.extra_json",
                params![
                    doc.filename.as_str(),
                    doc.filepath.as_str(),
                    doc.url.as_str(),
                    doc.doc_type.as_str(),
                    doc.source.as_str(),
                    doc.file_hash.as_str(),
                    doc.file_size_mb,
                    doc.download_date.to_rfc3339(),
                    i64::from(doc.cached),
                    extra.as_str(),
                ],
            )
            .await
            .map_err(|e| DocIntelError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get a document by filename.
    pub async fn get_document(&self, filename: &str) -> Result<Option<DocumentMetadata>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE filename = ?1"),
                params![filename],
            )
            .await
            .map_err(|e| DocIntelError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_document(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DocIntelError::Storage(e.to_string())),
        }
    }

    /// List all documents, grouped by source then filename.
    pub async fn list_documents(&self) -> Result<Vec<DocumentMetadata>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY source, filename"),
                params![],
            )
            .await
            .map_err(|e| DocIntelError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_document(&row)?);
        }
        Ok(results)
    }

    /// List documents published by one source.
    pub async fn list_documents_by_source(&self, source: &str) -> Result<Vec<DocumentMetadata>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE source = ?1 ORDER BY filename"
                ),
                params![source],
            )
            .await
            .map_err(|e| DocIntelError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_document(&row)?);
        }
        Ok(results)
    }

    /// Delete a document by filename.
    pub async fn delete_document(&self, filename: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM documents WHERE filename = ?1", params![filename])
            .await
            .map_err(|e| DocIntelError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Download job operations
    // -----------------------------------------------------------------------

    /// Insert a new download job. Returns the generated job ID.
    pub async fn insert_download_job(&self) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO download_jobs (id, started_at) VALUES (?1, ?2)",
                params![id.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| DocIntelError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Update a download job with completion data.
    pub async fn update_download_job(&self, job_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE download_jobs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, job_id],
            )
            .await
            .map_err(|e| DocIntelError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Stats JSON of the most recently finished job, if any.
    pub async fn last_download_job_stats(&self) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT stats_json FROM download_jobs
                 WHERE finished_at IS NOT NULL
                 ORDER BY started_at DESC LIMIT 1",
                params![],
            )
            .await
            .map_err(|e| DocIntelError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<String>(0).ok()),
            Ok(None) => Ok(None),
            Err(e) => Err(DocIntelError::Storage(e.to_string())),
        }
    }
}

/// Source-specific labels stored as JSON beside the fixed columns.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ExtraFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    year: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    regulation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contract_type: Option<String>,
}

impl From<&DocumentMetadata> for ExtraFields {
    fn from(doc: &DocumentMetadata) -> Self {
        Self {
            description: doc.description.clone(),
            company: doc.company.clone(),
            year: doc.year,
            regulation: doc.regulation.clone(),
            topic: doc.topic.clone(),
            contract_type: doc.contract_type.clone(),
        }
    }
}

/// Convert a database row to a [`DocumentMetadata`].
fn row_to_document(row: &libsql::Row) -> Result<DocumentMetadata> {
    let text = |idx: i32| -> Result<String> {
        row.get::<String>(idx)
            .map_err(|e| DocIntelError::Storage(e.to_string()))
    };

    let doc_type = text(3)?.parse()?;
    let download_date = {
        let s = text(7)?;
        chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DocIntelError::Storage(format!("invalid date: {e}")))?
    };
    let extra: ExtraFields = match row.get::<String>(9) {
        Ok(json) => serde_json::from_str(&json)
            .map_err(|e| DocIntelError::Storage(format!("invalid extra_json: {e}")))?,
        Err(_) => ExtraFields::default(),
    };

    Ok(DocumentMetadata {
        filename: text(0)?,
        filepath: text(1)?,
        url: text(2)?,
        doc_type,
        source: text(4)?,
        file_hash: text(5)?,
        file_size_mb: row
            .get::<f64>(6)
            .map_err(|e| DocIntelError::Storage(e.to_string()))?,
        download_date,
        cached: row.get::<i64>(8).unwrap_or(0) != 0,
        description: extra.description,
        company: extra.company,
        year: extra.year,
        regulation: extra.regulation,
        topic: extra.topic,
        contract_type: extra.contract_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docintel_shared::DocType;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("docintel_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn sample(filename: &str, source: &str) -> DocumentMetadata {
        DocumentMetadata {
            filename: filename.into(),
            filepath: format!("data/raw/{filename}"),
            url: format!("https://example.org/{filename}"),
            doc_type: DocType::Regulation,
            file_hash: "a".repeat(64),
            file_size_mb: 1.5,
            download_date: Utc::now(),
            cached: false,
            source: source.into(),
            description: Some("Payment Services Directive".into()),
            company: None,
            year: None,
            regulation: Some("PSD2".into()),
            topic: None,
            contract_type: None,
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("docintel_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn document_upsert_and_query() {
        let storage = test_storage().await;
        let doc = sample("psd2_directive_2015.html", "EUR-Lex");

        storage.upsert_document(&doc).await.expect("upsert document");

        let found = storage
            .get_document("psd2_directive_2015.html")
            .await
            .expect("get document")
            .expect("document present");
        assert_eq!(found.doc_type, DocType::Regulation);
        assert_eq!(found.regulation.as_deref(), Some("PSD2"));
        assert_eq!(found.file_size_mb, 1.5);

        // Upsert (update) with a new hash
        let updated = DocumentMetadata {
            file_hash: "b".repeat(64),
            cached: true,
            ..doc
        };
        storage.upsert_document(&updated).await.expect("upsert again");
        let found = storage
            .get_document("psd2_directive_2015.html")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.file_hash, "b".repeat(64));
        assert!(found.cached);

        assert_eq!(storage.list_documents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_by_source_and_delete() {
        let storage = test_storage().await;
        storage.upsert_document(&sample("a.html", "EUR-Lex")).await.unwrap();
        storage.upsert_document(&sample("b.pdf", "BaFin")).await.unwrap();
        storage.upsert_document(&sample("c.html", "EUR-Lex")).await.unwrap();

        let eu = storage.list_documents_by_source("EUR-Lex").await.unwrap();
        assert_eq!(eu.len(), 2);

        let all = storage.list_documents().await.unwrap();
        assert_eq!(all[0].source, "BaFin");

        storage.delete_document("a.html").await.unwrap();
        assert!(storage.get_document("a.html").await.unwrap().is_none());
        assert_eq!(storage.list_documents().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn download_job_lifecycle() {
        let storage = test_storage().await;
        assert!(storage.last_download_job_stats().await.unwrap().is_none());

        let job_id = storage.insert_download_job().await.expect("insert job");
        assert!(!job_id.is_empty());

        storage
            .update_download_job(&job_id, r#"{"downloaded": 14}"#)
            .await
            .expect("update job");

        let stats = storage.last_download_job_stats().await.unwrap();
        assert!(stats.unwrap().contains("14"));
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("docintel_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.upsert_document(&sample("a.html", "EUR-Lex")).await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.list_documents().await.unwrap().len(), 1);
        let result = ro.upsert_document(&sample("b.html", "EUR-Lex")).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }
}
