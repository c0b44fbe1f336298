// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! This module provides the command-line interface for tapline using clap.
//! It supports multiple subcommands for different operations:
//!
//! - `run`: Start the telemetry client (default)
//! - `validate`: Validate configuration file
//! - `version`: Show version information
//! - `ls`: Browse the server address space
//! - `read` / `write`: One-shot node access
//! - `history`: Query stored history

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// tapline - industrial telemetry client and historian
///
/// Connects to an industrial server, subscribes to node value changes,
/// and records them into a queryable history store, with an optional
/// REST API for operations.
#[derive(Parser, Debug)]
#[command(
    name = "tapline",
    author = "Sylvex <contact@sylvex.io>",
    version = tapline_core::VERSION,
    about = "Industrial telemetry client and historian",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "tapline.yaml",
        env = "TAPLINE_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); config file value
    /// applies when omitted
    #[arg(short, long, env = "TAPLINE_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact); config file value applies
    /// when omitted
    #[arg(long, env = "TAPLINE_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the tapline CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the telemetry client
    ///
    /// This is the default command when no subcommand is specified.
    /// It connects the session, starts the historian when autostart is
    /// configured, and serves the REST API.
    Run(RunArgs),

    /// Validate the configuration file
    ///
    /// Parses and validates the configuration file without starting
    /// anything. Useful for checking configuration before deployment.
    Validate(ValidateArgs),

    /// Show detailed version information
    ///
    /// Displays version information for all components including
    /// build metadata.
    Version,

    /// List child nodes of an address-space node
    ///
    /// Without an argument, lists the children of the server root.
    Ls(LsArgs),

    /// Read the current value of a node
    Read(ReadArgs),

    /// Write a value to a node
    ///
    /// The value is coerced from its string spelling: integers, then
    /// floats, falling back to text.
    Write(WriteArgs),

    /// Query stored history for a node
    History(HistoryArgs),
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Do not serve the REST API even when enabled in the config
    #[arg(long)]
    pub no_api: bool,

    /// Skip historian autostart regardless of the config
    #[arg(long)]
    pub no_autostart: bool,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `ls` command.
#[derive(Args, Debug, Default, Clone)]
pub struct LsArgs {
    /// Node to list children of (server root when omitted)
    pub node: Option<String>,
}

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Node identifier to read
    pub node: String,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Node identifier to write
    pub node: String,

    /// Value to write (coerced from its spelling)
    pub value: String,
}

/// Arguments for the `history` command.
#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Node identifier to query
    pub node: String,

    /// Return the N most recent points (default when no range given)
    #[arg(long, conflicts_with_all = ["start", "end", "bucket_secs"])]
    pub last: Option<u32>,

    /// Range start (epoch seconds or ISO timestamp)
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// Range end (epoch seconds or ISO timestamp)
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Keep only the newest point per bucket of this many seconds
    #[arg(long, requires = "start")]
    pub bucket_secs: Option<u64>,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<tapline_config::LogFormat> for LogFormat {
    fn from(format: tapline_config::LogFormat) -> Self {
        match format {
            tapline_config::LogFormat::Pretty => LogFormat::Text,
            tapline_config::LogFormat::Compact => LogFormat::Compact,
            tapline_config::LogFormat::Json => LogFormat::Json,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Check if verbose logging is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// The log level forced by flags, if any.
    ///
    /// `--quiet` and `--verbose` win over an explicit `--log-level`;
    /// `None` means the config file (or the `info` default) decides.
    pub fn effective_log_level(&self) -> Option<&str> {
        if self.quiet {
            Some("warn")
        } else if self.verbose {
            Some("debug")
        } else {
            self.log_level.as_deref()
        }
    }
}

impl Default for ValidateArgs {
    fn default() -> Self {
        Self {
            show_config: false,
            format: OutputFormat::Text,
            strict: false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
