//! Workspace provisioning: the staged data directories and the log directory.
//!
//! Creates the following layout:
//! ```text
//! <root>/
//! ├── data/
//! │   ├── raw/        downloaded source documents
//! │   ├── parsed/
//! │   ├── enriched/
//! │   └── features/
//! └── logs/
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use docintel_shared::{DocIntelError, Result};

/// Name of the data directory under the workspace root.
pub const DATA_DIR: &str = "data";

/// Name of the log directory under the workspace root.
pub const LOGS_DIR: &str = "logs";

/// Processing stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStage {
    Raw,
    Parsed,
    Enriched,
    Features,
}

impl DataStage {
    pub const ALL: [DataStage; 4] = [
        DataStage::Raw,
        DataStage::Parsed,
        DataStage::Enriched,
        DataStage::Features,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            DataStage::Raw => "raw",
            DataStage::Parsed => "parsed",
            DataStage::Enriched => "enriched",
            DataStage::Features => "features",
        }
    }

    /// Directory of this stage under `root`.
    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(DATA_DIR).join(self.dir_name())
    }
}

/// Every directory the layout consists of, stages first.
pub fn layout_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = DataStage::ALL.iter().map(|s| s.path(root)).collect();
    dirs.push(root.join(LOGS_DIR));
    dirs
}

/// One directory handled by [`provision`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedDir {
    pub path: PathBuf,
    /// False when the directory already existed.
    pub created: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProvisionReport {
    pub dirs: Vec<ProvisionedDir>,
}

impl ProvisionReport {
    pub fn created_count(&self) -> usize {
        self.dirs.iter().filter(|d| d.created).count()
    }
}

/// Create the data stage and log directories under `root`. Idempotent.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn provision(root: &Path) -> Result<ProvisionReport> {
    let mut report = ProvisionReport::default();

    for dir in layout_dirs(root) {
        let existed = dir.is_dir();
        std::fs::create_dir_all(&dir).map_err(|e| DocIntelError::io(&dir, e))?;
        debug!(path = %dir.display(), created = !existed, "provisioned directory");
        report.dirs.push(ProvisionedDir {
            path: dir,
            created: !existed,
        });
    }

    info!(created = report.created_count(), "workspace provisioned");
    Ok(report)
}

/// State of one layout directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DirStatus {
    pub path: PathBuf,
    pub empty: bool,
}

/// Check that every layout directory exists and report which are empty.
pub fn verify_layout(root: &Path) -> Result<Vec<DirStatus>> {
    let mut statuses = Vec::new();

    for dir in layout_dirs(root) {
        if !dir.is_dir() {
            return Err(DocIntelError::validation(format!(
                "missing directory {}",
                dir.display()
            )));
        }
        let mut entries = std::fs::read_dir(&dir).map_err(|e| DocIntelError::io(&dir, e))?;
        statuses.push(DirStatus {
            empty: entries.next().is_none(),
            path: dir,
        });
    }

    Ok(statuses)
}
