//! Query request/response types and the engines that answer them.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use docintel_catalog::{Catalog, CatalogEntry};
use docintel_core::pipeline::metadata_path;
use docintel_core::load_metadata;
use docintel_shared::Result;

fn default_top_k() -> usize {
    5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_true")]
    pub include_compliance_check: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Citation {
    pub doc_id: String,
    pub section: String,
    pub page_range: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub confidence: f64,
    pub potential_risks: Vec<String>,
    pub compliance_risk_level: String,
}

/// An engine's answer plus the per-document scores behind it.
#[derive(Debug, Clone)]
pub struct EngineAnswer {
    pub response: QueryResponse,
    /// (doc_id, score) for every cited document, best first.
    pub scores: Vec<(String, f64)>,
}

/// Answers queries for the `/query` endpoint.
pub trait QueryEngine: Send + Sync {
    /// Name recorded in the audit log's decision events.
    fn name(&self) -> &str;

    fn answer(&self, request: &QueryRequest) -> Result<EngineAnswer>;
}

/// Load the catalog under `root`. No metadata file yet means an empty catalog.
pub fn load_catalog(root: &std::path::Path) -> Result<Catalog> {
    if !metadata_path(root).exists() {
        return Ok(Catalog::default());
    }
    Ok(Catalog::from_metadata(&load_metadata(root)?))
}

/// Answers from catalog metadata alone: entries are ranked by the share of
/// query terms found in their filename, type, description and source.
pub struct CatalogQueryEngine {
    root: PathBuf,
}

impl CatalogQueryEngine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl QueryEngine for CatalogQueryEngine {
    fn name(&self) -> &str {
        "catalog"
    }

    fn answer(&self, request: &QueryRequest) -> Result<EngineAnswer> {
        let catalog = load_catalog(&self.root)?;
        Ok(rank_catalog(&catalog, request))
    }
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

fn entry_terms(entry: &CatalogEntry) -> BTreeSet<String> {
    let mut all = terms(&entry.filename);
    all.extend(terms(entry.doc_type.as_str()));
    all.extend(terms(&entry.description));
    all.extend(terms(&entry.source));
    all
}

/// Rank `catalog` against `request` and build the response.
pub fn rank_catalog(catalog: &Catalog, request: &QueryRequest) -> EngineAnswer {
    let query_terms = terms(&request.query);

    let mut scored: Vec<(&CatalogEntry, f64)> = if query_terms.is_empty() {
        Vec::new()
    } else {
        catalog
            .entries()
            .filter_map(|entry| {
                let haystack = entry_terms(entry);
                let hits = query_terms.iter().filter(|t| haystack.contains(*t)).count();
                (hits > 0).then(|| (entry, hits as f64 / query_terms.len() as f64))
            })
            .collect()
    };
    scored.sort_by(|(a, sa), (b, sb)| sb.total_cmp(sa).then_with(|| a.filename.cmp(&b.filename)));
    scored.truncate(request.top_k);

    let confidence = scored.first().map_or(0.0, |(_, score)| *score);
    let answer = if scored.is_empty() {
        "No catalogued documents match the query.".to_string()
    } else {
        let listed: Vec<String> = scored
            .iter()
            .map(|(entry, _)| format!("{} ({}, {})", entry.filename, entry.description, entry.source))
            .collect();
        format!(
            "{} catalogued document(s) match the query: {}",
            scored.len(),
            listed.join("; ")
        )
    };

    EngineAnswer {
        response: QueryResponse {
            answer,
            citations: scored
                .iter()
                .map(|(entry, _)| Citation {
                    doc_id: entry.filename.clone(),
                    section: "catalog".into(),
                    page_range: Vec::new(),
                })
                .collect(),
            confidence,
            potential_risks: Vec::new(),
            compliance_risk_level: "LOW".into(),
        },
        scores: scored
            .into_iter()
            .map(|(entry, score)| (entry.filename.clone(), score))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docintel_shared::DocType;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::default();
        for (filename, doc_type, description, source) in [
            ("gdpr_regulation_2016.html", DocType::Regulation, "General Data Protection Regulation", "EUR-Lex"),
            ("psd2_directive_2015.html", DocType::Regulation, "Payment Services Directive", "EUR-Lex"),
            ("basel3_finalising_reforms.pdf", DocType::Regulation, "Basel III: Finalising post-crisis reforms", "BIS Basel Committee"),
            ("jpmorgan_10k_2022.html", DocType::AnnualReport, "JPMorgan Chase", "SEC Edgar"),
        ] {
            catalog.push(CatalogEntry {
                filename: filename.into(),
                doc_type,
                description: description.into(),
                size_mb: 1.0,
                source: source.into(),
            });
        }
        catalog
    }

    fn request(query: &str, top_k: usize) -> QueryRequest {
        QueryRequest {
            query: query.into(),
            top_k,
            include_compliance_check: true,
        }
    }

    #[test]
    fn request_defaults() {
        let req: QueryRequest = serde_json::from_str(r#"{"query": "gdpr"}"#).unwrap();
        assert_eq!(req.top_k, 5);
        assert!(req.include_compliance_check);
    }

    #[test]
    fn best_match_first() {
        let out = rank_catalog(&catalog(), &request("GDPR data protection", 5));
        assert_eq!(out.response.citations[0].doc_id, "gdpr_regulation_2016.html");
        assert_eq!(out.response.citations[0].section, "catalog");
        assert!((out.response.confidence - 1.0).abs() < 1e-9);
        assert_eq!(out.response.compliance_risk_level, "LOW");
        assert_eq!(out.scores[0].0, "gdpr_regulation_2016.html");
    }

    #[test]
    fn top_k_limits_citations() {
        let out = rank_catalog(&catalog(), &request("regulation directive", 2));
        assert_eq!(out.response.citations.len(), 2);
        assert_eq!(out.scores.len(), 2);
    }

    #[test]
    fn no_match_has_zero_confidence() {
        let out = rank_catalog(&catalog(), &request("cryptocurrency staking", 5));
        assert!(out.response.citations.is_empty());
        assert_eq!(out.response.confidence, 0.0);
        assert!(out.response.answer.starts_with("No catalogued documents"));
    }

    #[test]
    fn annual_report_type_label_matches() {
        let out = rank_catalog(&catalog(), &request("annual report", 5));
        assert_eq!(out.response.citations.len(), 1);
        assert_eq!(out.response.citations[0].doc_id, "jpmorgan_10k_2022.html");
    }
}
