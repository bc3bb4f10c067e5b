//! Core domain types for the document catalog.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DocIntelError;

/// Bytes per megabyte used for every size reported in the catalog.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

// ---------------------------------------------------------------------------
// DocType
// ---------------------------------------------------------------------------

/// Category label of a catalogued document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Regulation,
    AnnualReport,
    Guidance,
    Contract,
}

impl DocType {
    /// Every category, in the order the dataset README documents them.
    pub const ALL: [DocType; 4] = [
        DocType::AnnualReport,
        DocType::Regulation,
        DocType::Guidance,
        DocType::Contract,
    ];

    /// The label used in metadata files and catalog tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Regulation => "regulation",
            DocType::AnnualReport => "annual_report",
            DocType::Guidance => "guidance",
            DocType::Contract => "contract",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = DocIntelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DocIntelError::validation(format!("unknown document type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// SourceDocument
// ---------------------------------------------------------------------------

/// A downloadable document in the source registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Where the document is published.
    pub url: String,
    /// File name under `data/raw/`.
    pub filename: String,
    /// Category label.
    pub doc_type: DocType,
    /// Originating authority (e.g. `EUR-Lex`).
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Issuer of an annual report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Fiscal year of an annual report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    /// Short name of a regulation (e.g. `MiFID II`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_type: Option<String>,
}

impl SourceDocument {
    /// Human-readable label for progress output.
    pub fn display_label(&self) -> String {
        let desc = self.description.as_deref().unwrap_or(&self.filename);
        if let Some(company) = &self.company {
            match self.year {
                Some(year) => format!("{company} - {year} Annual Report"),
                None => company.clone(),
            }
        } else if let Some(regulation) = &self.regulation {
            format!("{regulation} - {desc}")
        } else if let Some(topic) = &self.topic {
            format!("{topic} - {desc}")
        } else if let Some(contract_type) = &self.contract_type {
            contract_type.clone()
        } else {
            desc.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentMetadata
// ---------------------------------------------------------------------------

/// Metadata for a document present in `data/raw/`, as written to
/// `sources_metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: String,
    /// Path of the file on disk.
    pub filepath: String,
    pub url: String,
    pub doc_type: DocType,
    /// SHA-256 of the file contents, lowercase hex.
    pub file_hash: String,
    pub file_size_mb: f64,
    pub download_date: DateTime<Utc>,
    /// True when the file was already on disk and no request was made.
    pub cached: bool,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_type: Option<String>,
}

impl DocumentMetadata {
    /// Build the metadata record for `doc` once its bytes are on disk.
    pub fn for_source(
        doc: &SourceDocument,
        filepath: impl Into<String>,
        file_hash: String,
        size_bytes: u64,
        cached: bool,
    ) -> Self {
        Self {
            filename: doc.filename.clone(),
            filepath: filepath.into(),
            url: doc.url.clone(),
            doc_type: doc.doc_type,
            file_hash,
            file_size_mb: size_bytes as f64 / BYTES_PER_MB,
            download_date: Utc::now(),
            cached,
            source: doc.source.clone(),
            description: doc.description.clone(),
            company: doc.company.clone(),
            year: doc.year,
            regulation: doc.regulation.clone(),
            topic: doc.topic.clone(),
            contract_type: doc.contract_type.clone(),
        }
    }

    /// Text shown in the catalog's description column.
    pub fn catalog_description(&self) -> &str {
        self.description
            .as_deref()
            .or(self.company.as_deref())
            .or(self.topic.as_deref())
            .unwrap_or("N/A")
    }
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
