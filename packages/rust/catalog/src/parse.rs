//! Parser for rendered dataset READMEs.
//!
//! Only the `### <source> (<n> documents)` sections and their tables are read;
//! everything else in the README is prose and is skipped. Cells are kept as
//! raw text so the consistency checks can report bad values instead of
//! failing the whole parse.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use docintel_shared::{DocIntelError, DocType, Result};

use crate::{Catalog, CatalogEntry};

static SECTION_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^###\s+(?P<source>.+?)\s+\((?P<count>\d+)\s+documents?\)\s*$")
        .expect("valid section heading regex")
});

/// A README table row, cells unvalidated.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub filename: String,
    pub doc_type: String,
    pub description: String,
    pub size: String,
    /// 1-based line number in the README.
    pub line: usize,
}

/// One `### <source> (<n> documents)` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSection {
    pub source: String,
    /// Count stated in the heading.
    pub declared_count: usize,
    pub rows: Vec<ParsedRow>,
}

/// A README read back section by section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCatalog {
    pub sections: Vec<ParsedSection>,
}

impl ParsedCatalog {
    /// Total rows across all sections.
    pub fn row_count(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }

    /// Convert into a typed [`Catalog`]. Fails on the first unknown type
    /// label or unparseable size.
    pub fn into_catalog(self) -> Result<Catalog> {
        let mut catalog = Catalog::default();
        for section in self.sections {
            for row in section.rows {
                let doc_type: DocType = row.doc_type.parse()?;
                let size_mb: f64 = row.size.parse().map_err(|_| {
                    DocIntelError::parse(format!(
                        "line {}: invalid size '{}' for {}",
                        row.line, row.size, row.filename
                    ))
                })?;
                catalog.push(CatalogEntry {
                    filename: row.filename,
                    doc_type,
                    description: row.description,
                    size_mb,
                    source: section.source.clone(),
                });
            }
        }
        Ok(catalog)
    }
}

/// Parse a rendered dataset README.
pub fn parse_readme(text: &str) -> Result<ParsedCatalog> {
    let mut parsed = ParsedCatalog::default();
    let mut current: Option<ParsedSection> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        let line_no = idx + 1;

        if line.starts_with('#') {
            if let Some(section) = current.take() {
                parsed.sections.push(section);
            }
            if let Some(caps) = SECTION_HEADING.captures(line) {
                let declared_count = caps["count"].parse().map_err(|_| {
                    DocIntelError::parse(format!("line {line_no}: count out of range"))
                })?;
                current = Some(ParsedSection {
                    source: caps["source"].to_string(),
                    declared_count,
                    rows: Vec::new(),
                });
            }
            continue;
        }

        let Some(section) = current.as_mut() else {
            continue;
        };
        if !line.starts_with('|') {
            continue;
        }

        let cells = split_row(line);
        if is_header_row(&cells) || is_separator_row(&cells) {
            continue;
        }
        if cells.len() != 4 {
            return Err(DocIntelError::parse(format!(
                "line {line_no}: expected 4 table cells, found {}",
                cells.len()
            )));
        }

        let mut cells = cells.into_iter();
        let mut next = || cells.next().unwrap_or_default();
        section.rows.push(ParsedRow {
            filename: next(),
            doc_type: next(),
            description: next(),
            size: next(),
            line: line_no,
        });
    }

    if let Some(section) = current.take() {
        parsed.sections.push(section);
    }

    debug!(
        sections = parsed.sections.len(),
        rows = parsed.row_count(),
        "parsed catalog README"
    );

    Ok(parsed)
}

/// Split a Markdown table row into trimmed, unescaped cells.
fn split_row(line: &str) -> Vec<String> {
    let inner = line.strip_prefix('|').unwrap_or(line);
    let inner = match inner.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => inner,
    };

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                cell.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

fn is_header_row(cells: &[String]) -> bool {
    cells.first().is_some_and(|c| c.eq_ignore_ascii_case("filename"))
}

fn is_separator_row(cells: &[String]) -> bool {
    cells
        .iter()
        .all(|c| !c.is_empty() && c.chars().all(|ch| ch == '-' || ch == ':'))
}
