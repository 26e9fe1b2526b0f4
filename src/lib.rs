// Store Revenue - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod aggregate;
pub mod args;
pub mod currency;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod parser;
pub mod render;
pub mod report;

#[cfg(feature = "tui")]
pub mod ui;

use std::path::Path;
use tracing::{debug, info};

// Re-export commonly used types
pub use aggregate::{gross_of, Aggregation, Grouped, Reduction, Totals, GROSS_MULTIPLIER};
pub use currency::{currency_for_country, currency_symbol};
pub use error::{ReportError, Result};
pub use ingest::{locate_table, LineRange};
pub use normalize::{coerce_number, month_labels, parse_date};
pub use parser::{
    detect_source, get_parser, AppStoreParser, AppleSale, GooglePlayParser, GoogleSale, Source,
    StoreParser,
};
pub use render::{render_text, TextTable};
pub use report::{CountryRow, CurrencyRow, Notice, NoticeLevel, ProductRow, Records, Report};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build a report from an uploaded export.
pub fn analyze(source: Source, data: &[u8]) -> Result<Report> {
    let parser = get_parser(source);
    debug!(
        "Analyzing {} bytes with {} parser v{}",
        data.len(),
        source.name(),
        parser.version()
    );
    parser.analyze(data)
}

/// Read `path` and build its report, detecting the source when none is given.
pub fn analyze_file(path: &Path, source: Option<Source>) -> Result<Report> {
    let data = std::fs::read(path)?;
    let source = match source {
        Some(source) => source,
        None => {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            detect_source(name, &data)?
        }
    };
    info!("Reading {} as a {} export", path.display(), source.name());
    analyze(source, &data)
}
