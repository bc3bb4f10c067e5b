//! Dataset catalog: the README table of downloaded documents.
//!
//! This crate provides:
//! - [`Catalog`]: documents grouped by source, built from metadata records
//! - [`render_readme`]: the human-readable dataset README
//! - [`parse_readme`]: reads a README back into a [`ParsedCatalog`]
//! - [`check_consistency`]: declared counts, type labels, duplicates, sizes

pub mod checks;
pub mod parse;
pub mod render;

use std::collections::BTreeMap;

use serde::Serialize;

use docintel_shared::{DocType, DocumentMetadata};

pub use checks::{CatalogIssue, check_consistency};
pub use parse::{ParsedCatalog, ParsedRow, ParsedSection, parse_readme};
pub use render::render_readme;

/// One row of the catalog table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub filename: String,
    pub doc_type: DocType,
    pub description: String,
    pub size_mb: f64,
    pub source: String,
}

/// All rows published by one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogSection {
    pub source: String,
    pub entries: Vec<CatalogEntry>,
}

/// Documents grouped by source, in first-seen source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    pub sections: Vec<CatalogSection>,
}

/// Totals printed at the end of a download run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogSummary {
    pub total_documents: usize,
    pub total_size_mb: f64,
    pub by_type: BTreeMap<DocType, usize>,
}

impl Catalog {
    /// Group metadata records by source, keeping insertion order.
    pub fn from_metadata(records: &[DocumentMetadata]) -> Self {
        let mut catalog = Catalog::default();
        for record in records {
            catalog.push(CatalogEntry {
                filename: record.filename.clone(),
                doc_type: record.doc_type,
                description: record.catalog_description().to_string(),
                size_mb: record.file_size_mb,
                source: record.source.clone(),
            });
        }
        catalog
    }

    /// Append an entry to its source section, opening the section if needed.
    pub fn push(&mut self, entry: CatalogEntry) {
        match self.sections.iter_mut().find(|s| s.source == entry.source) {
            Some(section) => section.entries.push(entry),
            None => self.sections.push(CatalogSection {
                source: entry.source.clone(),
                entries: vec![entry],
            }),
        }
    }

    /// Every entry, section by section.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.sections.iter().flat_map(|s| s.entries.iter())
    }

    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| s.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the section for `source` (exact match).
    pub fn section(&self, source: &str) -> Option<&CatalogSection> {
        self.sections.iter().find(|s| s.source == source)
    }

    pub fn summary(&self) -> CatalogSummary {
        let mut summary = CatalogSummary::default();
        for entry in self.entries() {
            summary.total_documents += 1;
            summary.total_size_mb += entry.size_mb;
            *summary.by_type.entry(entry.doc_type).or_insert(0) += 1;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(filename: &str, source: &str, doc_type: DocType, size: f64) -> DocumentMetadata {
        DocumentMetadata {
            filename: filename.into(),
            filepath: format!("data/raw/{filename}"),
            url: format!("https://example.org/{filename}"),
            doc_type,
            file_hash: "0".repeat(64),
            file_size_mb: size,
            download_date: Utc::now(),
            cached: false,
            source: source.into(),
            description: None,
            company: Some("Goldman Sachs".into()),
            year: Some(2022),
            regulation: None,
            topic: None,
            contract_type: None,
        }
    }

    #[test]
    fn groups_by_source_in_first_seen_order() {
        let records = vec![
            record("gs.html", "SEC Edgar", DocType::AnnualReport, 3.0),
            record("gdpr.html", "EUR-Lex", DocType::Regulation, 1.0),
            record("jef.html", "SEC Edgar", DocType::AnnualReport, 2.5),
        ];
        let catalog = Catalog::from_metadata(&records);

        let sources: Vec<&str> = catalog.sections.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(sources, vec!["SEC Edgar", "EUR-Lex"]);
        assert_eq!(catalog.section("SEC Edgar").unwrap().entries.len(), 2);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.sections[0].entries[0].description, "Goldman Sachs");
    }

    #[test]
    fn summary_counts_types_and_size() {
        let records = vec![
            record("gs.html", "SEC Edgar", DocType::AnnualReport, 3.0),
            record("gdpr.html", "EUR-Lex", DocType::Regulation, 1.25),
            record("crr.html", "EUR-Lex", DocType::Regulation, 0.75),
        ];
        let summary = Catalog::from_metadata(&records).summary();
        assert_eq!(summary.total_documents, 3);
        assert!((summary.total_size_mb - 5.0).abs() < 1e-9);
        assert_eq!(summary.by_type[&DocType::Regulation], 2);
        assert_eq!(summary.by_type.get(&DocType::Contract), None);
    }

    #[test]
    fn summary_serializes_type_keys() {
        let records = vec![record("gs.html", "SEC Edgar", DocType::AnnualReport, 3.0)];
        let json = serde_json::to_value(Catalog::from_metadata(&records).summary()).unwrap();
        assert_eq!(json["by_type"]["annual_report"], 1);
    }
}
