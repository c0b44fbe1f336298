// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::logging;
use crate::runtime::RuntimeBuilder;

/// Executes the `run` command to start the telemetry client.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    // Build the runtime first so the config's logging section can feed
    // the subscriber; config load errors go straight to stderr.
    let runtime = RuntimeBuilder::new()
        .config_path(&cli.config)
        .skip_api(args.no_api)
        .skip_autostart(args.no_autostart)
        .build()?;

    logging::init_runtime_logging(cli, &runtime.config().logging)?;

    runtime.run().await
}
