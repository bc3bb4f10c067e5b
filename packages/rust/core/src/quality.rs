//! Quality checks on document metadata records.

use std::cmp::Ordering;

use chrono::Utc;
use tracing::warn;
use url::Url;

use docintel_shared::DocumentMetadata;

/// Outcome of checking one record.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    pub filename: String,
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validates metadata produced by a download run.
#[derive(Debug, Clone)]
pub struct QualityChecker {
    /// Files at or below this size are treated as failed downloads.
    pub min_size_mb: f64,
}

impl Default for QualityChecker {
    fn default() -> Self {
        Self { min_size_mb: 0.0 }
    }
}

impl QualityChecker {
    pub fn new(min_size_mb: f64) -> Self {
        Self { min_size_mb }
    }

    pub fn validate(&self, doc: &DocumentMetadata) -> QualityReport {
        let mut errors = Vec::new();

        if doc.filename.trim().is_empty() {
            errors.push("missing filename".to_string());
        }
        if doc.source.trim().is_empty() {
            errors.push("missing source".to_string());
        }

        if doc.file_hash.len() != 64
            || !doc
                .file_hash
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            errors.push(format!("file hash '{}' is not a SHA-256 hex digest", doc.file_hash));
        }

        if doc.file_size_mb.partial_cmp(&self.min_size_mb) != Some(Ordering::Greater) {
            errors.push(format!(
                "size {:.4} MB not above minimum {:.4} MB",
                doc.file_size_mb, self.min_size_mb
            ));
        }

        match Url::parse(&doc.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => errors.push(format!("source URL '{}' is not an http(s) URL", doc.url)),
        }

        if doc.download_date > Utc::now() {
            errors.push("download date is in the future".to_string());
        }

        let valid = errors.is_empty();
        if !valid {
            warn!(filename = %doc.filename, ?errors, "metadata quality check failed");
        }

        QualityReport {
            filename: doc.filename.clone(),
            valid,
            errors,
        }
    }
}
