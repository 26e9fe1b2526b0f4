//! Command-line interface of the `store-revenue` binaries.

use crate::parser::Source;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// store-revenue: gross/net revenue calculator for storefront exports.
///
/// Reads a Google Play sales export or an App Store settlement export, cleans the
/// numbers and prints totals plus breakdowns by currency, product and country.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    /// The CSV export to analyze.
    file: PathBuf,

    /// Which storefront produced the file. Detected from the file name and content
    /// when omitted.
    #[arg(long, short = 's', env = "STORE_REVENUE_SOURCE", value_enum)]
    source: Option<SourceArg>,

    /// How to present the report.
    #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::default())]
    format: OutputFormat,

    #[clap(flatten)]
    logging: Logging,
}

impl Args {
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn source(&self) -> Option<Source> {
        self.source.map(Source::from)
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn log_level(&self) -> LevelFilter {
        self.logging.log_level
    }
}

/// Arguments of the HTTP server.
#[derive(Debug, Parser, Clone)]
pub struct ServerArgs {
    /// Address to listen on.
    #[arg(long, env = "STORE_REVENUE_ADDR", default_value = "0.0.0.0:3000")]
    addr: String,

    #[clap(flatten)]
    logging: Logging,
}

impl ServerArgs {
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn log_level(&self) -> LevelFilter {
        self.logging.log_level
    }
}

/// Logging options shared by all binaries.
#[derive(Debug, Parser, Clone)]
pub struct Logging {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::WARN)]
    log_level: LevelFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Google,
    Apple,
}

impl From<SourceArg> for Source {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::Google => Source::GooglePlay,
            SourceArg::Apple => Source::AppStore,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Interactive terminal UI
    #[default]
    Tui,
    /// Plain text tables
    Text,
    /// The whole report as JSON
    Json,
}

// Library and binary crates whose events pass the default filter.
const LOG_TARGETS: [&str; 2] = ["store_revenue", "store_revenue_server"];

/// Initializes the tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        None => EnvFilter::new(
            LOG_TARGETS
                .iter()
                .map(|target| format!("{}={}", target, level))
                .collect::<Vec<_>>()
                .join(","),
        ),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
