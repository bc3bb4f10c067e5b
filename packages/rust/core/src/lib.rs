//! Dataset orchestration for the document intelligence workspace.
//!
//! This crate ties the source registry, downloader, quality checks, document
//! index and catalog together into end-to-end workflows (e.g.
//! [`pipeline::build_dataset`]).

pub mod pipeline;
pub mod provision;
pub mod quality;
pub mod registry;

pub use pipeline::{
    DatasetConfig, DatasetResult, ProgressReporter, SilentProgress, VerifyReport, build_dataset,
    load_metadata, render_catalog, verify_dataset,
};
pub use provision::{DataStage, ProvisionReport, provision, verify_layout};
pub use quality::{QualityChecker, QualityReport};
pub use registry::{builtin_sources, resolve_registry, sources_for};
