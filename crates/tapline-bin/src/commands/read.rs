// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` command.

use crate::cli::{Cli, ReadArgs};
use crate::error::BinResult;
use crate::runtime;

/// Executes the `read` command to print a node's current value.
pub async fn read(cli: &Cli, args: ReadArgs) -> BinResult<()> {
    let config = tapline_config::load_config(&cli.config)?;
    let session = runtime::connect_session(&config).await?;

    let result = session.read_value(&args.node).await;
    session.disconnect().await;

    let value = result?;
    println!("{} = {} ({})", args.node, value, value.type_name());

    Ok(())
}
