//! Shared types, error model, and configuration for the document
//! intelligence workspace.
//!
//! This crate is the foundation depended on by all other crates.
//! It provides:
//! - [`DocIntelError`]: the unified error type
//! - Domain types ([`DocType`], [`SourceDocument`], [`DocumentMetadata`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, AppConfig, DEFAULT_API_PORT, DefaultsConfig, FetchConfig, FetchPoliciesConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, resolve_api_token,
};
pub use error::{DocIntelError, Result};
pub use types::{BYTES_PER_MB, DocType, DocumentMetadata, SourceDocument, sha256_hex};
