//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docintel_api::AppState;
use docintel_core::pipeline::{self, DatasetConfig, DatasetResult, ProgressReporter};
use docintel_core::{provision, registry};
use docintel_fetcher::FetchReport;
use docintel_shared::{AppConfig, FetchConfig, init_config, load_config, resolve_api_token};
use docintel_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docintel: public financial documents for document intelligence.
#[derive(Parser)]
#[command(
    name = "docintel",
    version,
    about = "Provision the data workspace, download regulatory and financial source documents, and serve the query API.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Workspace root holding data/ and logs/ (defaults to config `workspace_root`).
    #[arg(long, env = "DOCINTEL_ROOT", global = true)]
    pub root: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create the data stage directories and the log directory.
    Provision,

    /// Download source documents and rebuild the catalog.
    Download {
        /// Only download documents from this source (e.g. "EUR-Lex").
        #[arg(short, long)]
        source: Option<String>,

        /// Maximum concurrent downloads (overrides config).
        #[arg(long)]
        concurrency: Option<u32>,

        /// Pause after each download in milliseconds (overrides config).
        #[arg(long)]
        rate_limit_ms: Option<u64>,

        /// Files at or below this size fail the quality check.
        #[arg(long, default_value_t = 0.0)]
        min_size_mb: f64,
    },

    /// Catalog maintenance.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// List indexed documents.
    List {
        /// Only list documents from this source.
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Start the HTTP API.
    Serve {
        /// Port to listen on (overrides config).
        #[arg(long)]
        port: Option<u16>,

        /// Interface to bind (overrides config).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Catalog subcommands.
#[derive(Subcommand)]
pub(crate) enum CatalogAction {
    /// Re-render data/raw/README.md from the metadata JSON.
    Render,
    /// Check the README for count, type, duplicate and size problems.
    Verify,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},hyper=warn,libsql=warn")));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = load_config()?;
    let root = cli
        .root
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.defaults.workspace_root));

    match cli.command {
        Command::Provision => cmd_provision(&root),
        Command::Download {
            source,
            concurrency,
            rate_limit_ms,
            min_size_mb,
        } => {
            let mut fetch = FetchConfig::from(&config);
            if let Some(c) = concurrency {
                fetch.concurrency = c.max(1);
            }
            if let Some(ms) = rate_limit_ms {
                fetch.rate_limit_ms = ms;
            }
            cmd_download(&config, &root, source.as_deref(), fetch, min_size_mb).await
        }
        Command::Catalog { action } => match action {
            CatalogAction::Render => cmd_catalog_render(&root),
            CatalogAction::Verify => cmd_catalog_verify(&root),
        },
        Command::List { source } => cmd_list(&root, source.as_deref()).await,
        Command::Serve { port, bind } => cmd_serve(config, &root, port, bind).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_provision(root: &Path) -> Result<()> {
    let report = provision::provision(root)?;
    for dir in &report.dirs {
        let state = if dir.created { "created" } else { "exists " };
        println!("  {state}  {}", dir.path.display());
    }
    println!(
        "\n  {} of {} directories created",
        report.created_count(),
        report.dirs.len()
    );
    Ok(())
}

async fn cmd_download(
    config: &AppConfig,
    root: &Path,
    source: Option<&str>,
    fetch: FetchConfig,
    min_size_mb: f64,
) -> Result<()> {
    let all = registry::resolve_registry(&config.defaults)?;
    let sources = match source {
        Some(name) => {
            let selected: Vec<_> = registry::sources_for(&all, name)
                .into_iter()
                .cloned()
                .collect();
            if selected.is_empty() {
                return Err(eyre!("no registered documents for source '{name}'"));
            }
            selected
        }
        None => all,
    };

    info!(
        root = %root.display(),
        documents = sources.len(),
        source = source.unwrap_or("all"),
        "starting download"
    );

    let dataset_config = DatasetConfig {
        root: root.to_path_buf(),
        fetch,
        sources,
        min_size_mb,
        allow_localhost: false,
    };

    let reporter = CliProgress::new();
    let result = pipeline::build_dataset(&dataset_config, &reporter).await?;

    println!();
    println!("  Download complete!");
    println!("  Documents:  {}", result.summary.total_documents);
    println!("  Downloaded: {}", result.downloaded);
    println!("  Cached:     {}", result.cached);
    println!("  Total size: {:.2} MB", result.summary.total_size_mb);
    println!("  By type:");
    for (doc_type, count) in &result.summary.by_type {
        println!("    {doc_type}: {count}");
    }
    if !result.fetch_errors.is_empty() {
        println!("  Failed:");
        for (filename, error) in &result.fetch_errors {
            println!("    {filename}: {error}");
        }
    }
    if !result.quality_failures.is_empty() {
        println!("  Quality check failures:");
        for report in &result.quality_failures {
            println!("    {}: {}", report.filename, report.errors.join("; "));
        }
    }
    println!("  Metadata:   {}", result.metadata_path.display());
    println!("  Catalog:    {}", result.readme_path.display());
    println!("  Time:       {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_done(&self, source: &str, current: usize, total: usize, report: &FetchReport) {
        self.spinner.println(format!(
            "  [{current}/{total}] {source}: {} downloaded, {} cached, {} failed",
            report.downloaded,
            report.cached,
            report.errors.len()
        ));
    }

    fn done(&self, _result: &DatasetResult) {
        self.spinner.finish_and_clear();
    }
}

fn cmd_catalog_render(root: &Path) -> Result<()> {
    let path = pipeline::render_catalog(root)?;
    println!("Catalog written to: {}", path.display());
    Ok(())
}

fn cmd_catalog_verify(root: &Path) -> Result<()> {
    let report = pipeline::verify_dataset(root)?;

    for issue in &report.issues {
        println!("  {issue}");
    }
    for filename in &report.missing_from_metadata {
        println!("  {filename}: listed in README but missing from metadata");
    }
    for filename in &report.missing_from_catalog {
        println!("  {filename}: in metadata but not listed in README");
    }

    if !report.is_consistent() {
        return Err(eyre!("catalog is inconsistent ({} rows checked)", report.rows));
    }
    println!("Catalog consistent: {} documents", report.rows);
    Ok(())
}

async fn cmd_list(root: &Path, source: Option<&str>) -> Result<()> {
    let db_path = pipeline::index_path(root);
    if !db_path.exists() {
        return Err(eyre!(
            "no document index at '{}'; run `docintel download` first",
            db_path.display()
        ));
    }

    let storage = Storage::open_readonly(&db_path).await?;
    let documents = match source {
        Some(name) => storage.list_documents_by_source(name).await?,
        None => storage.list_documents().await?,
    };

    if documents.is_empty() {
        println!("No documents indexed.");
        return Ok(());
    }

    println!(
        "  {:<40} {:<14} {:>9}  {}",
        "FILENAME", "TYPE", "SIZE (MB)", "SOURCE"
    );
    for doc in &documents {
        println!(
            "  {:<40} {:<14} {:>9.2}  {}",
            doc.filename, doc.doc_type, doc.file_size_mb, doc.source
        );
    }
    Ok(())
}

async fn cmd_serve(
    mut config: AppConfig,
    root: &Path,
    port: Option<u16>,
    bind: Option<String>,
) -> Result<()> {
    if let Some(port) = port {
        config.api.port = port;
    }
    if let Some(bind) = bind {
        config.api.bind = bind;
    }

    let addr: SocketAddr = format!("{}:{}", config.api.bind, config.api.port)
        .parse()
        .map_err(|e| eyre!("invalid bind address '{}': {e}", config.api.bind))?;

    let token = resolve_api_token(&config);
    let state = AppState::new(root, &config.api, token)?;

    println!("Serving API on http://{addr}");
    docintel_api::serve(state, addr).await?;
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
