//! Source document downloader.
//!
//! Downloads registry documents into a destination directory, skipping files
//! already on disk, with bounded concurrency, a politeness delay and SSRF
//! protection. Every document present after a run gets a [`DocumentMetadata`]
//! record (SHA-256, size, provenance).

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use docintel_shared::{
    DocIntelError, DocumentMetadata, FetchConfig, Result, SourceDocument, sha256_hex,
};

/// User-Agent string for download requests.
const USER_AGENT: &str = concat!("docintel/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// FetchReport
// ---------------------------------------------------------------------------

/// Summary of a completed download run.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Metadata for every document now on disk, in request order.
    pub documents: Vec<DocumentMetadata>,
    /// Documents fetched over the network during this run.
    pub downloaded: usize,
    /// Documents that were already present.
    pub cached: usize,
    /// Failures (filename, error message). Failed documents are skipped.
    pub errors: Vec<(String, String)>,
    /// Total duration of the run.
    pub duration: Duration,
}

impl FetchReport {
    /// Fold another report (e.g. the next source group) into this one.
    pub fn merge(&mut self, other: FetchReport) {
        self.documents.extend(other.documents);
        self.downloaded += other.downloaded;
        self.cached += other.cached;
        self.errors.extend(other.errors);
        self.duration += other.duration;
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// HTTP downloader for registry documents.
pub struct Fetcher {
    config: FetchConfig,
    client: Client,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_localhost: bool,
}

impl Fetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocIntelError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            allow_localhost: false,
        })
    }

    /// Allow downloads from localhost/private IPs (mock servers in tests).
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    /// Download a single document into `dest_dir`.
    ///
    /// If the file already exists no request is made and the returned
    /// metadata has `cached = true`.
    #[instrument(skip_all, fields(filename = %doc.filename))]
    pub async fn download(&self, doc: &SourceDocument, dest_dir: &Path) -> Result<DocumentMetadata> {
        fetch_document(
            &self.client,
            doc,
            dest_dir,
            self.config.rate_limit_ms,
            self.allow_localhost,
        )
        .await
    }

    /// Download every document in `docs` into `dest_dir`.
    ///
    /// Individual failures are recorded in [`FetchReport::errors`] and do not
    /// abort the run.
    #[instrument(skip_all, fields(count = docs.len(), dest = %dest_dir.display()))]
    pub async fn download_all(&self, docs: &[SourceDocument], dest_dir: &Path) -> Result<FetchReport> {
        let start_time = Instant::now();

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| DocIntelError::io(dest_dir, e))?;

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1) as usize));
        let mut handles = Vec::with_capacity(docs.len());

        for doc in docs {
            let client = self.client.clone();
            let sem = semaphore.clone();
            let doc = doc.clone();
            let dest: PathBuf = dest_dir.to_path_buf();
            let rate_limit = self.config.rate_limit_ms;
            let allow_localhost = self.allow_localhost;

            handles.push(tokio::spawn(async move {
                let _permit = sem
                    .acquire()
                    .await
                    .map_err(|e| DocIntelError::Network(format!("semaphore closed: {e}")))?;
                fetch_document(&client, &doc, &dest, rate_limit, allow_localhost).await
            }));
        }

        let mut report = FetchReport::default();

        // Handles are awaited in request order so the report keeps registry order.
        for (doc, handle) in docs.iter().zip(handles) {
            match handle.await {
                Ok(Ok(meta)) => {
                    if meta.cached {
                        report.cached += 1;
                    } else {
                        report.downloaded += 1;
                    }
                    report.documents.push(meta);
                }
                Ok(Err(e)) => {
                    warn!(filename = %doc.filename, error = %e, "download failed");
                    report.errors.push((doc.filename.clone(), e.to_string()));
                }
                Err(e) => {
                    report.errors.push((doc.filename.clone(), format!("task failed: {e}")));
                }
            }
        }

        report.duration = start_time.elapsed();

        info!(
            downloaded = report.downloaded,
            cached = report.cached,
            errors = report.errors.len(),
            duration_ms = report.duration.as_millis(),
            "download run completed"
        );

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Document fetching
// ---------------------------------------------------------------------------

/// Fetch one document, or describe the copy already on disk.
async fn fetch_document(
    client: &Client,
    doc: &SourceDocument,
    dest_dir: &Path,
    rate_limit_ms: u64,
    allow_localhost: bool,
) -> Result<DocumentMetadata> {
    validate_filename(&doc.filename)?;
    let filepath = dest_dir.join(&doc.filename);

    if tokio::fs::try_exists(&filepath)
        .await
        .map_err(|e| DocIntelError::io(&filepath, e))?
    {
        info!(filename = %doc.filename, "already exists, skipping download");
        return describe_existing(doc, &filepath).await;
    }

    let url = Url::parse(&doc.url)
        .map_err(|e| DocIntelError::validation(format!("invalid URL '{}': {e}", doc.url)))?;

    if !allow_localhost && is_ssrf_target(&url) {
        warn!(%url, "SSRF protection: blocked");
        return Err(DocIntelError::Network(format!("{url}: blocked by SSRF protection")));
    }

    info!(filename = %doc.filename, label = %doc.display_label(), "downloading");

    let mut response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| DocIntelError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DocIntelError::Network(format!("{url}: HTTP {status}")));
    }

    // Stream into a temp file, then rename so a failed download never leaves
    // a partial file that would later be treated as cached.
    let temp = dest_dir.join(format!(".{}.part", doc.filename));
    let (file_hash, size_bytes) = persist_body(&mut response, &url, &temp, &filepath).await?;
    debug!(filename = %doc.filename, size_bytes, "downloaded");

    if rate_limit_ms > 0 {
        tokio::time::sleep(Duration::from_millis(rate_limit_ms)).await;
    }

    Ok(DocumentMetadata::for_source(
        doc,
        filepath.to_string_lossy(),
        file_hash,
        size_bytes,
        false,
    ))
}

/// Write the response body to `temp`, then rename it to `target`.
/// Returns the SHA-256 hex digest and byte count. `temp` is removed on failure.
async fn persist_body(
    response: &mut reqwest::Response,
    url: &Url,
    temp: &Path,
    target: &Path,
) -> Result<(String, u64)> {
    let written = write_body(response, url, temp, target).await;
    if written.is_err() {
        let _ = tokio::fs::remove_file(temp).await;
    }
    written
}

async fn write_body(
    response: &mut reqwest::Response,
    url: &Url,
    temp: &Path,
    target: &Path,
) -> Result<(String, u64)> {
    let mut file = tokio::fs::File::create(temp)
        .await
        .map_err(|e| DocIntelError::io(temp, e))?;

    let mut hasher = Sha256::new();
    let mut size_bytes: u64 = 0;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| DocIntelError::Network(format!("{url}: body read failed: {e}")))?
    {
        hasher.update(&chunk);
        size_bytes += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(|e| DocIntelError::io(temp, e))?;
    }

    file.flush().await.map_err(|e| DocIntelError::io(temp, e))?;
    drop(file);

    tokio::fs::rename(temp, target)
        .await
        .map_err(|e| DocIntelError::io(target, e))?;

    Ok((format!("{:x}", hasher.finalize()), size_bytes))
}

/// Build metadata for a document that is already on disk.
async fn describe_existing(doc: &SourceDocument, filepath: &Path) -> Result<DocumentMetadata> {
    let bytes = tokio::fs::read(filepath)
        .await
        .map_err(|e| DocIntelError::io(filepath, e))?;

    Ok(DocumentMetadata::for_source(
        doc,
        filepath.to_string_lossy(),
        sha256_hex(&bytes),
        bytes.len() as u64,
        true,
    ))
}

/// Reject file names that could escape the destination directory.
pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty()
        || filename == "."
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(DocIntelError::validation(format!(
            "unsafe document filename '{filename}'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
pub(crate) fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    if let Some(host) = url.host_str() {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        if host == "localhost" || host.ends_with(".local") || host.ends_with(".internal") {
            return true;
        }
    }

    false
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod fetcher_tests {
    use super::*;
    use docintel_shared::DocType;
    use uuid::Uuid;

    fn test_config() -> FetchConfig {
        FetchConfig {
            concurrency: 2,
            rate_limit_ms: 0,
            timeout_secs: 5,
        }
    }

    fn doc(url: String, filename: &str) -> SourceDocument {
        SourceDocument {
            url,
            filename: filename.into(),
            doc_type: DocType::Regulation,
            source: "BIS Basel Committee".into(),
            description: Some("Principles for operational resilience".into()),
            company: None,
            year: None,
            regulation: None,
            topic: Some("Operational Risk".into()),
            contract_type: None,
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("docintel-{tag}-{}", Uuid::now_v7()))
    }

    #[test]
    fn test_ssrf_protection_blocks_file() {
        let url = Url::parse("file:///etc/passwd").unwrap();
        assert!(is_ssrf_target(&url));
    }

    #[test]
    fn test_ssrf_protection_blocks_private_ip() {
        for raw in ["http://192.168.1.1/admin", "http://10.0.0.1/", "http://127.0.0.1:8080/"] {
            let url = Url::parse(raw).unwrap();
            assert!(is_ssrf_target(&url), "{raw} should be blocked");
        }
    }

    #[test]
    fn test_ssrf_blocks_localhost_and_ipv6_loopback() {
        assert!(is_ssrf_target(&Url::parse("http://localhost:3000/api").unwrap()));
        assert!(is_ssrf_target(&Url::parse("http://[::1]:8000/").unwrap()));
        assert!(is_ssrf_target(&Url::parse("http://files.internal/x.pdf").unwrap()));
    }

    #[test]
    fn test_ssrf_protection_allows_public() {
        let url = Url::parse("https://www.bis.org/bcbs/publ/d424.pdf").unwrap();
        assert!(!is_ssrf_target(&url));
    }

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("basel3_finalising_reforms.pdf").is_ok());
        assert!(validate_filename("../etc/passwd").is_err());
        assert!(validate_filename("nested/file.pdf").is_err());
        assert!(validate_filename("").is_err());
    }

    #[tokio::test]
    async fn test_download_writes_file_and_hash() {
        let server = wiremock::MockServer::start().await;
        let body = b"%PDF-1.4 operational resilience".to_vec();

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/bcbs/publ/d457.pdf"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = temp_dir("download");
        let fetcher = Fetcher::new(test_config()).unwrap().allow_localhost();
        let source = doc(format!("{}/bcbs/publ/d457.pdf", server.uri()), "basel_operational_risk.pdf");

        let meta = fetcher.download(&source, &dir).await.unwrap();
        assert!(!meta.cached);
        assert_eq!(meta.file_hash, sha256_hex(&body));
        assert_eq!(meta.topic.as_deref(), Some("Operational Risk"));

        let on_disk = std::fs::read(dir.join("basel_operational_risk.pdf")).unwrap();
        assert_eq!(on_disk, body);
        assert!(!dir.join(".basel_operational_risk.pdf.part").exists());

        // Second call must not hit the server again (expect(1) above).
        let again = fetcher.download(&source, &dir).await.unwrap();
        assert!(again.cached);
        assert_eq!(again.file_hash, meta.file_hash);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_http_error_leaves_no_file() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/missing.pdf"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = temp_dir("http-error");
        std::fs::create_dir_all(&dir).unwrap();
        let fetcher = Fetcher::new(test_config()).unwrap().allow_localhost();
        let source = doc(format!("{}/missing.pdf", server.uri()), "missing.pdf");

        let err = fetcher.download(&source, &dir).await.unwrap_err();
        assert!(err.to_string().contains("404"));
        assert!(!dir.join("missing.pdf").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_blocks_localhost_by_default() {
        let dir = temp_dir("ssrf");
        std::fs::create_dir_all(&dir).unwrap();
        let fetcher = Fetcher::new(test_config()).unwrap();
        let source = doc("http://127.0.0.1:9/secret.pdf".into(), "secret.pdf");

        let err = fetcher.download(&source, &dir).await.unwrap_err();
        assert!(err.to_string().contains("SSRF"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_download_all_records_failures_and_continues() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/a.pdf"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("alpha"))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::path("/b.pdf"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::path("/c.pdf"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("gamma"))
            .mount(&server)
            .await;

        let dir = temp_dir("download-all");
        let fetcher = Fetcher::new(test_config()).unwrap().allow_localhost();
        let docs = vec![
            doc(format!("{}/a.pdf", server.uri()), "a.pdf"),
            doc(format!("{}/b.pdf", server.uri()), "b.pdf"),
            doc(format!("{}/c.pdf", server.uri()), "c.pdf"),
        ];

        let report = fetcher.download_all(&docs, &dir).await.unwrap();
        assert_eq!(report.downloaded, 2);
        assert_eq!(report.cached, 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].0, "b.pdf");

        let names: Vec<&str> = report.documents.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "c.pdf"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_report_merge() {
        let mut a = FetchReport {
            downloaded: 1,
            errors: vec![("x.pdf".into(), "boom".into())],
            ..Default::default()
        };
        let b = FetchReport {
            downloaded: 2,
            cached: 3,
            ..Default::default()
        };
        a.merge(b);
        assert_eq!(a.downloaded, 3);
        assert_eq!(a.cached, 3);
        assert_eq!(a.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/d424.pdf"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("%PDF-1.4"))
            .mount(&server)
            .await;

        let dir = temp_dir("rename-error");
        std::fs::create_dir_all(&dir).unwrap();
        let url = Url::parse(&format!("{}/d424.pdf", server.uri())).unwrap();
        let mut response = reqwest::get(url.as_str()).await.unwrap();

        let temp = dir.join(".d424.pdf.part");
        let target = dir.join("no-such-dir").join("d424.pdf");
        let err = persist_body(&mut response, &url, &temp, &target)
            .await
            .unwrap_err();
        assert!(matches!(err, DocIntelError::Io { .. }));
        assert!(!temp.exists());
        assert!(!target.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
