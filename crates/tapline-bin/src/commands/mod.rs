// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! This module contains the implementation of all CLI commands:
//!
//! - `run`: Start the telemetry client
//! - `validate`: Validate configuration file
//! - `version`: Show version information
//! - `ls`: Browse the server address space
//! - `read` / `write`: One-shot node access
//! - `history`: Query stored history

mod history;
mod ls;
mod read;
mod run;
mod validate;
mod version;
mod write;

pub use history::history;
pub use ls::ls;
pub use read::read;
pub use run::run;
pub use validate::validate;
pub use version::version;
pub use write::write;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;
use crate::logging;

/// Executes the appropriate command based on CLI arguments.
///
/// `run` merges the CLI logging flags with the config file after it is
/// loaded; every other command logs from the flags alone.
pub async fn execute(cli: Cli) -> BinResult<()> {
    let command = cli.effective_command();

    if !matches!(command, Commands::Run(_)) {
        logging::init_logging(
            cli.effective_log_level().unwrap_or("info"),
            cli.log_format.unwrap_or_default(),
        );
    }

    match command {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
        Commands::Ls(args) => ls::ls(&cli, args).await,
        Commands::Read(args) => read::read(&cli, args).await,
        Commands::Write(args) => write::write(&cli, args).await,
        Commands::History(args) => history::history(&cli, args).await,
    }
}
