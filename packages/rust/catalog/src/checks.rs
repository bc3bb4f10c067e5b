//! Consistency checks over a parsed catalog README.

use std::collections::HashMap;
use std::fmt;

use docintel_shared::DocType;

use crate::ParsedCatalog;

/// A problem found in a catalog README.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogIssue {
    /// The heading's document count differs from the rows listed under it.
    CountMismatch {
        source: String,
        declared: usize,
        listed: usize,
    },
    /// A row's type is not one of the four documented categories.
    UnknownType { filename: String, label: String },
    /// The same filename appears more than once.
    DuplicateFilename { filename: String, sources: Vec<String> },
    /// A size cell that is not a non-negative number.
    InvalidSize { filename: String, value: String },
}

impl fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogIssue::CountMismatch {
                source,
                declared,
                listed,
            } => write!(
                f,
                "{source}: heading declares {declared} documents but {listed} are listed"
            ),
            CatalogIssue::UnknownType { filename, label } => {
                write!(f, "{filename}: unknown document type '{label}'")
            }
            CatalogIssue::DuplicateFilename { filename, sources } => {
                write!(f, "{filename}: listed more than once ({})", sources.join(", "))
            }
            CatalogIssue::InvalidSize { filename, value } => {
                write!(f, "{filename}: invalid size '{value}'")
            }
        }
    }
}

/// Check a parsed README. An empty result means the catalog is consistent.
pub fn check_consistency(catalog: &ParsedCatalog) -> Vec<CatalogIssue> {
    let mut issues = Vec::new();
    let mut seen: HashMap<&str, Vec<String>> = HashMap::new();

    for section in &catalog.sections {
        if section.declared_count != section.rows.len() {
            issues.push(CatalogIssue::CountMismatch {
                source: section.source.clone(),
                declared: section.declared_count,
                listed: section.rows.len(),
            });
        }

        for row in &section.rows {
            if row.doc_type.parse::<DocType>().is_err() {
                issues.push(CatalogIssue::UnknownType {
                    filename: row.filename.clone(),
                    label: row.doc_type.clone(),
                });
            }

            match row.size.parse::<f64>() {
                Ok(size) if size.is_finite() && size >= 0.0 => {}
                _ => issues.push(CatalogIssue::InvalidSize {
                    filename: row.filename.clone(),
                    value: row.size.clone(),
                }),
            }

            seen.entry(row.filename.as_str())
                .or_default()
                .push(section.source.clone());
        }
    }

    let mut duplicates: Vec<CatalogIssue> = seen
        .into_iter()
        .filter(|(_, sources)| sources.len() > 1)
        .map(|(filename, sources)| CatalogIssue::DuplicateFilename {
            filename: filename.to_string(),
            sources,
        })
        .collect();
    duplicates.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    issues.extend(duplicates);

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_readme;

    #[test]
    fn consistent_catalog_has_no_issues() {
        let text = "\
### EUR-Lex (4 documents)
| mifid2_directive_2014.html | regulation | MiFID II | 1.87 |
| psd2_directive_2015.html | regulation | PSD2 | 0.92 |
| gdpr_regulation_2016.html | regulation | GDPR | 1.10 |
| crr_regulation_2013.html | regulation | CRR | 3.02 |

### BIS Basel Committee (2 documents)
| basel3_finalising_reforms.pdf | regulation | Basel III | 2.41 |
| basel_operational_risk.pdf | regulation | Operational Risk | 0.40 |
";
        let parsed = parse_readme(text).unwrap();
        assert!(check_consistency(&parsed).is_empty());
    }

    #[test]
    fn detects_count_mismatch() {
        let text = "### BaFin (2 documents)\n| bafin_anti_money_laundering.pdf | guidance | AML | 0.80 |\n";
        let issues = check_consistency(&parse_readme(text).unwrap());
        assert_eq!(
            issues,
            vec![CatalogIssue::CountMismatch {
                source: "BaFin".into(),
                declared: 2,
                listed: 1,
            }]
        );
        assert_eq!(
            issues[0].to_string(),
            "BaFin: heading declares 2 documents but 1 are listed"
        );
    }

    #[test]
    fn detects_unknown_type_and_bad_size() {
        let text = "### ISDA (1 documents)\n| isda.html | template | ISDA | -1 |\n";
        let issues = check_consistency(&parse_readme(text).unwrap());
        assert_eq!(issues.len(), 2);
        assert!(matches!(&issues[0], CatalogIssue::UnknownType { label, .. } if label == "template"));
        assert!(matches!(&issues[1], CatalogIssue::InvalidSize { value, .. } if value == "-1"));
    }

    #[test]
    fn detects_duplicates_across_sections() {
        let text = "\
### BaFin (1 documents)
| report.pdf | annual_report | BaFin Annual Report | 1.00 |
### European Central Bank (1 documents)
| report.pdf | guidance | Manual | 1.00 |
";
        let issues = check_consistency(&parse_readme(text).unwrap());
        assert_eq!(
            issues,
            vec![CatalogIssue::DuplicateFilename {
                filename: "report.pdf".into(),
                sources: vec!["BaFin".into(), "European Central Bank".into()],
            }]
        );
    }

    #[test]
    fn readme_fixture_is_consistent() {
        let fixture = std::fs::read_to_string("../../../fixtures/catalog/README.fixture.md")
            .expect("read fixture");
        let parsed = parse_readme(&fixture).unwrap();
        assert!(check_consistency(&parsed).is_empty());
    }
}
