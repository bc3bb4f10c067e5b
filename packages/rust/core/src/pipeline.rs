//! End-to-end dataset build: provision, download, check, index, catalog.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use docintel_catalog::{
    Catalog, CatalogIssue, CatalogSummary, check_consistency, parse_readme, render_readme,
};
use docintel_fetcher::{FetchReport, Fetcher};
use docintel_shared::{DocIntelError, DocumentMetadata, FetchConfig, Result, SourceDocument};
use docintel_storage::Storage;

use crate::provision::{self, DataStage};
use crate::quality::{QualityChecker, QualityReport};
use crate::registry;

/// File name of the metadata JSON written next to the raw documents.
pub const METADATA_FILE: &str = "sources_metadata.json";

/// File name of the rendered catalog.
pub const README_FILE: &str = "README.md";

/// File name of the document index database.
pub const INDEX_FILE: &str = "index.db";

pub fn metadata_path(root: &Path) -> PathBuf {
    DataStage::Raw.path(root).join(METADATA_FILE)
}

pub fn readme_path(root: &Path) -> PathBuf {
    DataStage::Raw.path(root).join(README_FILE)
}

pub fn index_path(root: &Path) -> PathBuf {
    DataStage::Raw.path(root).join(INDEX_FILE)
}

/// Configuration for [`build_dataset`].
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Workspace root holding `data/` and `logs/`.
    pub root: PathBuf,
    pub fetch: FetchConfig,
    /// Documents to download, in registry order.
    pub sources: Vec<SourceDocument>,
    pub min_size_mb: f64,
    /// Permit loopback/private download URLs (mock servers).
    pub allow_localhost: bool,
}

/// Result of a dataset build.
#[derive(Debug)]
pub struct DatasetResult {
    pub readme_path: PathBuf,
    pub metadata_path: PathBuf,
    pub summary: CatalogSummary,
    pub downloaded: usize,
    pub cached: usize,
    /// Documents that could not be fetched: (filename, error).
    pub fetch_errors: Vec<(String, String)>,
    /// Records that failed a quality check. They stay in the catalog.
    pub quality_failures: Vec<QualityReport>,
    pub elapsed: Duration,
}

/// Progress callback for reporting build status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each source group has been downloaded.
    fn source_done(&self, source: &str, current: usize, total: usize, report: &FetchReport);
    /// Called when the build completes.
    fn done(&self, result: &DatasetResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_done(&self, _source: &str, _current: usize, _total: usize, _report: &FetchReport) {}
    fn done(&self, _result: &DatasetResult) {}
}

/// Build the dataset under `config.root`.
///
/// Documents are downloaded one source at a time. A document that fails to
/// download is recorded in [`DatasetResult::fetch_errors`] and left out of
/// the catalog; any filesystem or storage failure aborts the build.
#[instrument(skip_all, fields(root = %config.root.display(), sources = config.sources.len()))]
pub async fn build_dataset(
    config: &DatasetConfig,
    progress: &dyn ProgressReporter,
) -> Result<DatasetResult> {
    let start = Instant::now();

    progress.phase("Provisioning workspace");
    provision::provision(&config.root)?;
    let raw_dir = DataStage::Raw.path(&config.root);

    progress.phase("Opening document index");
    let storage = Storage::open(&index_path(&config.root)).await?;
    let job_id = storage.insert_download_job().await?;

    let mut fetcher = Fetcher::new(config.fetch.clone())?;
    if config.allow_localhost {
        fetcher = fetcher.allow_localhost();
    }

    let groups = registry::group_by_source(&config.sources);
    let mut report = FetchReport::default();
    for (i, (source, docs)) in groups.iter().enumerate() {
        progress.phase(&format!("Downloading {source}"));
        let group_report = fetcher.download_all(docs, &raw_dir).await?;
        progress.source_done(source, i + 1, groups.len(), &group_report);
        report.merge(group_report);
    }

    progress.phase("Checking metadata quality");
    let checker = QualityChecker::new(config.min_size_mb);
    let quality_failures: Vec<QualityReport> = report
        .documents
        .iter()
        .map(|doc| checker.validate(doc))
        .filter(|r| !r.valid)
        .collect();

    progress.phase("Merging earlier records");
    let records = merge_records(&config.root, &config.sources, &report.documents)?;

    progress.phase("Updating document index");
    for doc in &report.documents {
        storage.upsert_document(doc).await?;
    }
    let pruned = prune_index(&storage, &records).await?;

    progress.phase("Writing catalog");
    let metadata_path = write_metadata(&config.root, &records)?;
    let catalog = Catalog::from_metadata(&records);
    let readme_path = write_readme(&config.root, &catalog)?;

    let result = DatasetResult {
        readme_path,
        metadata_path,
        summary: catalog.summary(),
        downloaded: report.downloaded,
        cached: report.cached,
        fetch_errors: report.errors,
        quality_failures,
        elapsed: start.elapsed(),
    };

    let stats = serde_json::json!({
        "total_documents": result.summary.total_documents,
        "total_size_mb": result.summary.total_size_mb,
        "downloaded": result.downloaded,
        "cached": result.cached,
        "errors": result.fetch_errors.len(),
        "quality_failures": result.quality_failures.len(),
    });
    storage.update_download_job(&job_id, &stats.to_string()).await?;

    progress.done(&result);

    info!(
        documents = result.summary.total_documents,
        downloaded = result.downloaded,
        cached = result.cached,
        errors = result.fetch_errors.len(),
        pruned,
        elapsed_ms = result.elapsed.as_millis(),
        "dataset build complete"
    );

    Ok(result)
}

/// Combine this run's records with those of the previous build.
///
/// Earlier records outside `sources` are kept while their files are still on
/// disk. When any are kept the previous order is preserved, with this run's
/// records replacing theirs in place and new ones placed after the last
/// record of the same source. Otherwise the run's own order is used.
fn merge_records(
    root: &Path,
    sources: &[SourceDocument],
    fresh: &[DocumentMetadata],
) -> Result<Vec<DocumentMetadata>> {
    if !metadata_path(root).exists() {
        return Ok(fresh.to_vec());
    }
    let raw_dir = DataStage::Raw.path(root);
    let in_run = |filename: &str| sources.iter().any(|s| s.filename == filename);

    let mut merged = Vec::new();
    let mut kept_previous = false;
    for previous in load_metadata(root)? {
        if in_run(&previous.filename) {
            if let Some(doc) = fresh.iter().find(|d| d.filename == previous.filename) {
                merged.push(doc.clone());
            }
        } else if raw_dir.join(&previous.filename).is_file() {
            merged.push(previous);
            kept_previous = true;
        }
    }
    if !kept_previous {
        return Ok(fresh.to_vec());
    }

    for doc in fresh {
        if merged.iter().any(|m| m.filename == doc.filename) {
            continue;
        }
        let at = merged
            .iter()
            .rposition(|m| m.source == doc.source)
            .map_or(merged.len(), |i| i + 1);
        merged.insert(at, doc.clone());
    }
    Ok(merged)
}

/// Delete index rows for documents no longer in `records`. Returns the
/// number of rows removed.
async fn prune_index(storage: &Storage, records: &[DocumentMetadata]) -> Result<usize> {
    let mut pruned = 0;
    for indexed in storage.list_documents().await? {
        if !records.iter().any(|r| r.filename == indexed.filename) {
            storage.delete_document(&indexed.filename).await?;
            debug!(filename = %indexed.filename, "removed from index");
            pruned += 1;
        }
    }
    Ok(pruned)
}

/// Write `records` as the pretty-printed metadata JSON array.
pub fn write_metadata(root: &Path, records: &[DocumentMetadata]) -> Result<PathBuf> {
    let path = metadata_path(root);
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| DocIntelError::parse(format!("failed to serialize metadata: {e}")))?;
    std::fs::write(&path, json).map_err(|e| DocIntelError::io(&path, e))?;
    Ok(path)
}

/// Read the metadata JSON written by the last build.
pub fn load_metadata(root: &Path) -> Result<Vec<DocumentMetadata>> {
    let path = metadata_path(root);
    let content = std::fs::read_to_string(&path).map_err(|e| DocIntelError::io(&path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| DocIntelError::parse(format!("invalid {}: {e}", path.display())))
}

fn write_readme(root: &Path, catalog: &Catalog) -> Result<PathBuf> {
    let path = readme_path(root);
    let readme = render_readme(catalog, Utc::now().date_naive());
    std::fs::write(&path, readme).map_err(|e| DocIntelError::io(&path, e))?;
    Ok(path)
}

/// Re-render the catalog README from the metadata JSON without downloading.
pub fn render_catalog(root: &Path) -> Result<PathBuf> {
    let records = load_metadata(root)?;
    write_readme(root, &Catalog::from_metadata(&records))
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Outcome of [`verify_dataset`].
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub rows: usize,
    pub issues: Vec<CatalogIssue>,
    /// Listed in the README but absent from the metadata JSON.
    pub missing_from_metadata: Vec<String>,
    /// Present in the metadata JSON but not listed in the README.
    pub missing_from_catalog: Vec<String>,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
            && self.missing_from_metadata.is_empty()
            && self.missing_from_catalog.is_empty()
    }
}

/// Check the README under `root` against itself and against the metadata JSON.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn verify_dataset(root: &Path) -> Result<VerifyReport> {
    let path = readme_path(root);
    let text = std::fs::read_to_string(&path).map_err(|e| DocIntelError::io(&path, e))?;
    let parsed = parse_readme(&text)?;
    let records = load_metadata(root)?;

    let listed: Vec<&str> = parsed
        .sections
        .iter()
        .flat_map(|s| s.rows.iter().map(|r| r.filename.as_str()))
        .collect();

    let report = VerifyReport {
        rows: parsed.row_count(),
        issues: check_consistency(&parsed),
        missing_from_metadata: listed
            .iter()
            .filter(|name| !records.iter().any(|r| r.filename == **name))
            .map(|name| name.to_string())
            .collect(),
        missing_from_catalog: records
            .iter()
            .filter(|r| !listed.contains(&r.filename.as_str()))
            .map(|r| r.filename.clone())
            .collect(),
    };

    if report.is_consistent() {
        info!(rows = report.rows, "catalog consistent");
    } else {
        warn!(
            issues = report.issues.len(),
            missing_from_metadata = report.missing_from_metadata.len(),
            missing_from_catalog = report.missing_from_catalog.len(),
            "catalog inconsistent"
        );
    }

    Ok(report)
}
