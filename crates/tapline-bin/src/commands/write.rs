// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `write` command.

use tapline_core::coerce_str;

use crate::cli::{Cli, WriteArgs};
use crate::error::BinResult;
use crate::runtime;

/// Executes the `write` command to write a coerced value to a node.
pub async fn write(cli: &Cli, args: WriteArgs) -> BinResult<()> {
    let value = coerce_str(&args.value);

    let config = tapline_config::load_config(&cli.config)?;
    let session = runtime::connect_session(&config).await?;

    let result = session.write_value(&args.node, value.clone()).await;
    session.disconnect().await;

    result?;
    println!("{} = {} ({})", args.node, value, value.type_name());

    Ok(())
}
