//! Source document downloader.
//!
//! This crate provides:
//! - [`Fetcher`]: concurrent, cache-aware downloader for registry documents
//! - [`FetchReport`]: per-run summary (downloaded, cached, failures)

pub mod engine;

pub use engine::{FetchReport, Fetcher, validate_filename};
