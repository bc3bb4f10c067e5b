//! Registry of downloadable source documents.
//!
//! The built-in registry lists the public filings, regulations, guidance and
//! contract summaries the dataset is compiled from. A TOML file with
//! `[[sources]]` tables can extend or replace it.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use docintel_shared::{DefaultsConfig, DocIntelError, DocType, Result, SourceDocument};

pub const SEC_EDGAR: &str = "SEC Edgar";
pub const EUR_LEX: &str = "EUR-Lex";
pub const BAFIN: &str = "BaFin";
pub const BIS_BASEL: &str = "BIS Basel Committee";
pub const ECB: &str = "European Central Bank";
pub const ISDA: &str = "ISDA";

/// `sources.toml` layout.
#[derive(Debug, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    sources: Vec<SourceDocument>,
}

fn annual_report(url: &str, filename: &str, company: &str, year: u16) -> SourceDocument {
    SourceDocument {
        url: url.into(),
        filename: filename.into(),
        doc_type: DocType::AnnualReport,
        source: SEC_EDGAR.into(),
        description: None,
        company: Some(company.into()),
        year: Some(year),
        regulation: None,
        topic: None,
        contract_type: None,
    }
}

fn eu_regulation(url: &str, filename: &str, regulation: &str, description: &str) -> SourceDocument {
    SourceDocument {
        url: url.into(),
        filename: filename.into(),
        doc_type: DocType::Regulation,
        source: EUR_LEX.into(),
        description: Some(description.into()),
        company: None,
        year: None,
        regulation: Some(regulation.into()),
        topic: None,
        contract_type: None,
    }
}

fn topical(
    source: &str,
    doc_type: DocType,
    url: &str,
    filename: &str,
    topic: &str,
    description: &str,
) -> SourceDocument {
    SourceDocument {
        url: url.into(),
        filename: filename.into(),
        doc_type,
        source: source.into(),
        description: Some(description.into()),
        company: None,
        year: None,
        regulation: None,
        topic: Some(topic.into()),
        contract_type: None,
    }
}

/// The built-in registry, grouped by source in download order.
pub fn builtin_sources() -> Vec<SourceDocument> {
    vec![
        annual_report(
            "https://www.sec.gov/Archives/edgar/data/19617/000001961723000090/jpm-20221231.htm",
            "jpmorgan_10k_2022.html",
            "JPMorgan Chase",
            2022,
        ),
        annual_report(
            "https://www.sec.gov/Archives/edgar/data/70858/000007085823000013/bac-20221231.htm",
            "bofa_10k_2022.html",
            "Bank of America",
            2022,
        ),
        annual_report(
            "https://www.sec.gov/Archives/edgar/data/831001/000083100123000096/gs-20221231.htm",
            "goldman_sachs_10k_2022.html",
            "Goldman Sachs",
            2022,
        ),
        annual_report(
            "https://www.sec.gov/Archives/edgar/data/200406/000020040623000013/jef-20221130.htm",
            "jefferies_10k_2022.html",
            "Jefferies Financial Group",
            2022,
        ),
        eu_regulation(
            "https://eur-lex.europa.eu/legal-content/EN/TXT/HTML/?uri=CELEX:32014L0065",
            "mifid2_directive_2014.html",
            "MiFID II",
            "Markets in Financial Instruments Directive",
        ),
        eu_regulation(
            "https://eur-lex.europa.eu/legal-content/EN/TXT/HTML/?uri=CELEX:32015L2366",
            "psd2_directive_2015.html",
            "PSD2",
            "Payment Services Directive",
        ),
        eu_regulation(
            "https://eur-lex.europa.eu/legal-content/EN/TXT/HTML/?uri=CELEX:32016R0679",
            "gdpr_regulation_2016.html",
            "GDPR",
            "General Data Protection Regulation",
        ),
        eu_regulation(
            "https://eur-lex.europa.eu/legal-content/EN/TXT/HTML/?uri=CELEX:32013R0575",
            "crr_regulation_2013.html",
            "CRR",
            "Capital Requirements Regulation",
        ),
        topical(
            BAFIN,
            DocType::Guidance,
            "https://www.bafin.de/SharedDocs/Downloads/EN/Merkblatt/BA/dl_mb_hinweise_geldwaeschegesetz_en.pdf?__blob=publicationFile&v=6",
            "bafin_anti_money_laundering.pdf",
            "Anti-Money Laundering",
            "BaFin Guidance Notice on Anti-Money Laundering",
        ),
        topical(
            BAFIN,
            DocType::AnnualReport,
            "https://www.bafin.de/SharedDocs/Downloads/EN/Aufsichtsrecht/dl_ar_2023_en.pdf?__blob=publicationFile&v=3",
            "bafin_annual_report_2022.pdf",
            "Supervisory Report",
            "BaFin Annual Report",
        ),
        topical(
            BIS_BASEL,
            DocType::Regulation,
            "https://www.bis.org/bcbs/publ/d424.pdf",
            "basel3_finalising_reforms.pdf",
            "Basel III",
            "Basel III: Finalising post-crisis reforms",
        ),
        topical(
            BIS_BASEL,
            DocType::Regulation,
            "https://www.bis.org/bcbs/publ/d457.pdf",
            "basel_operational_risk.pdf",
            "Operational Risk",
            "Principles for operational resilience",
        ),
        topical(
            ECB,
            DocType::Guidance,
            "https://www.bankingsupervision.europa.eu/ecb/pub/pdf/ssm.supervisorymanual202311~61729e59db.en.pdf",
            "ecb_supervisory_manual.pdf",
            "Banking Supervision",
            "ECB Banking Supervision Manual",
        ),
        // Full ISDA agreements need membership; the public summary page is used.
        SourceDocument {
            url: "https://www.isda.org/book/2002-isda-master-agreement/".into(),
            filename: "isda_master_agreement_info.html".into(),
            doc_type: DocType::Contract,
            source: ISDA.into(),
            description: Some(
                "International Swaps and Derivatives Association Master Agreement".into(),
            ),
            company: None,
            year: None,
            regulation: None,
            topic: None,
            contract_type: Some("ISDA Master Agreement".into()),
        },
    ]
}

/// Documents from `sources` published by `name` (case-insensitive).
pub fn sources_for<'a>(sources: &'a [SourceDocument], name: &str) -> Vec<&'a SourceDocument> {
    sources
        .iter()
        .filter(|s| s.source.eq_ignore_ascii_case(name))
        .collect()
}

/// Split `sources` into per-source groups, keeping first-seen order.
pub fn group_by_source(sources: &[SourceDocument]) -> Vec<(String, Vec<SourceDocument>)> {
    let mut groups: Vec<(String, Vec<SourceDocument>)> = Vec::new();
    for doc in sources {
        match groups.iter_mut().find(|(name, _)| *name == doc.source) {
            Some((_, docs)) => docs.push(doc.clone()),
            None => groups.push((doc.source.clone(), vec![doc.clone()])),
        }
    }
    groups
}

/// Load `[[sources]]` entries from a TOML file.
pub fn load_sources_file(path: &Path) -> Result<Vec<SourceDocument>> {
    let content = std::fs::read_to_string(path).map_err(|e| DocIntelError::io(path, e))?;
    let file: SourcesFile = toml::from_str(&content)
        .map_err(|e| DocIntelError::config(format!("failed to parse {}: {e}", path.display())))?;
    debug!(path = %path.display(), count = file.sources.len(), "loaded sources file");
    Ok(file.sources)
}

/// Resolve the registry for a run: built-ins, optionally extended or
/// replaced by the configured sources file. Later entries override earlier
/// ones with the same filename.
pub fn resolve_registry(defaults: &DefaultsConfig) -> Result<Vec<SourceDocument>> {
    let mut sources = if defaults.replace_builtin_sources {
        Vec::new()
    } else {
        builtin_sources()
    };

    if let Some(path) = &defaults.sources_file {
        for extra in load_sources_file(Path::new(path))? {
            match sources.iter_mut().find(|s| s.filename == extra.filename) {
                Some(existing) => *existing = extra,
                None => sources.push(extra),
            }
        }
    } else if defaults.replace_builtin_sources {
        return Err(DocIntelError::config(
            "replace_builtin_sources is set but no sources_file is configured",
        ));
    }

    Ok(sources)
}
