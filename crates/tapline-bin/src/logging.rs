// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.
//!
//! This module provides utilities for setting up structured logging
//! using the `tracing` ecosystem. The subscriber is initialized once
//! per process: one-shot commands use the CLI flags directly, while
//! `run` merges them with the `logging` section of the loaded config
//! (flags win, then the config, then the defaults).

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tapline_config::LoggingConfig;

use crate::cli::{Cli, LogFormat};
use crate::error::{BinError, BinResult};

// =============================================================================
// Logging Initialization
// =============================================================================

/// Initializes the logging subsystem from CLI flags alone.
///
/// # Arguments
///
/// * `level` - Log level string (trace, debug, info, warn, error)
/// * `format` - Log output format (text, json, compact)
pub fn init_logging(level: &str, format: LogFormat) {
    let filter = build_filter(level);

    match format {
        LogFormat::Text => init_text_logging(filter, true, None),
        LogFormat::Json => init_json_logging(filter, true, None),
        LogFormat::Compact => init_compact_logging(filter, None),
    }
}

/// Initializes the logging subsystem for the `run` command.
///
/// CLI flags override the config file; the optional log file from the
/// config is opened in append mode. Failing to open it aborts startup
/// rather than silently logging nowhere.
pub fn init_runtime_logging(cli: &Cli, config: &LoggingConfig) -> BinResult<()> {
    let level = resolve_level(cli.effective_log_level(), config);
    let format = resolve_format(cli.log_format, config);
    let filter = build_filter(level);

    let file = match &config.file {
        Some(path) => Some(open_log_file(path)?),
        None => None,
    };

    match format {
        LogFormat::Text => init_text_logging(filter, config.with_target, file),
        LogFormat::Json => init_json_logging(filter, config.with_target, file),
        LogFormat::Compact => init_compact_logging(filter, file),
    }

    Ok(())
}

/// Builds the env filter from the level string and environment.
///
/// `RUST_LOG` takes precedence when set; the extra directives keep the
/// HTTP stack from drowning out telemetry logs at debug level.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level))
        .add_directive("hyper=warn".parse().expect("static directive"))
        .add_directive("tower=warn".parse().expect("static directive"))
        .add_directive("axum=info".parse().expect("static directive"))
        .add_directive("sqlx=warn".parse().expect("static directive"))
}

/// Initializes text-based logging (default).
fn init_text_logging(filter: EnvFilter, with_target: bool, file: Option<Arc<File>>) {
    match file {
        Some(file) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(with_target)
                        .with_ansi(false)
                        .with_writer(file),
                )
                .init();
        }
        None => {
            let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(with_target)
                        .with_thread_ids(false)
                        .with_thread_names(false)
                        .with_file(false)
                        .with_line_number(false)
                        .with_ansi(is_terminal),
                )
                .init();
        }
    }
}

/// Initializes JSON logging (for production/log aggregation).
fn init_json_logging(filter: EnvFilter, with_target: bool, file: Option<Arc<File>>) {
    match file {
        Some(file) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(with_target)
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_writer(file),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(with_target)
                        .with_file(true)
                        .with_line_number(true)
                        .with_current_span(true)
                        .with_span_list(true),
                )
                .init();
        }
    }
}

/// Initializes compact logging (minimal output).
fn init_compact_logging(filter: EnvFilter, file: Option<Arc<File>>) {
    match file {
        Some(file) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(file),
                )
                .init();
        }
        None => {
            let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .with_ansi(is_terminal),
                )
                .init();
        }
    }
}

/// Opens the configured log file in append mode, creating parents.
fn open_log_file(path: &Path) -> BinResult<Arc<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BinError::Initialization(format!(
                    "Failed to create log directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            BinError::Initialization(format!("Failed to open log file {}: {}", path.display(), e))
        })?;

    Ok(Arc::new(file))
}

// =============================================================================
// Level and Format Resolution
// =============================================================================

/// Picks the log level: CLI flags first, then the config file.
fn resolve_level<'a>(cli_level: Option<&'a str>, config: &LoggingConfig) -> &'a str {
    cli_level.unwrap_or_else(|| config.level.as_str())
}

/// Picks the log format: CLI flag first, then the config file.
fn resolve_format(cli_format: Option<LogFormat>, config: &LoggingConfig) -> LogFormat {
    cli_format.unwrap_or_else(|| config.format.into())
}

/// Parses a log level string into a `Level`.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

// =============================================================================
// Tests
// =============================================================================
