// file: src/utils/logging.rs
// description: Tracing subscriber initialization, component spans and CLI formatting

use colored::*;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber. `RUST_LOG` overrides the level picked
/// by `verbose`. With `log_file` set, output is also appended there
/// without ANSI codes.
pub fn init_logger(
    colored_output: bool,
    verbose: bool,
    log_file: Option<&Path>,
) -> std::io::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact()
        .with_ansi(colored_output);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(file_layer)
        .try_init()
        .map_err(std::io::Error::other)
}

/// Root span every component span hangs off.
pub fn root_span() -> Span {
    tracing::info_span!("trendhub", pid = std::process::id())
}

/// Span handed to a long-lived component at construction time.
pub fn component_span(parent: &Span, component: &'static str) -> Span {
    tracing::info_span!(parent: parent, "component", name = component)
}

pub fn format_success(msg: &str) -> String {
    format!("{} {}", "✓".green().bold(), msg.green())
}

pub fn format_error(msg: &str) -> String {
    format!("{} {}", "✗".red().bold(), msg.red())
}

pub fn format_warning(msg: &str) -> String {
    format!("{} {}", "⚠".yellow().bold(), msg.yellow())
}

pub fn format_info(msg: &str) -> String {
    format!("{} {}", "ℹ".blue().bold(), msg)
}

pub fn format_rank(position: usize, msg: &str) -> String {
    format!("{} {}", format!("{:>3}.", position).cyan().bold(), msg)
}
