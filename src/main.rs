// Store Revenue - CLI
// The terminal UI is only compiled with the `tui` feature
#[cfg(feature = "tui")]
use store_revenue::ui;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use store_revenue::args::{init_logger, Args, OutputFormat};
use store_revenue::{analyze_file, render_text, Report};
use tracing::{debug, error};

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.log_level());
    debug!("{args:?}");

    // Bad uploads are reported, never propagated as a crash.
    let report = match analyze_file(args.file(), args.source()) {
        Ok(report) => report,
        Err(e) => {
            error!("Failed to build report: {e}");
            eprintln!("❌ {}", e.user_message());
            return ExitCode::FAILURE;
        }
    };

    match present(report, args.format()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

fn present(report: Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Tui => run_ui_mode(report)?,
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(report: Report) -> Result<()> {
    let mut app = ui::App::new(report);
    ui::run_ui(&mut app)
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_report: Report) -> Result<()> {
    anyhow::bail!("TUI mode not available. Rebuild with `--features tui` or use `--format text`")
}
