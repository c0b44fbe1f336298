// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `ls` command.

use crate::cli::{Cli, LsArgs};
use crate::error::BinResult;
use crate::runtime;

/// Executes the `ls` command to list children of a node.
pub async fn ls(cli: &Cli, args: LsArgs) -> BinResult<()> {
    let config = tapline_config::load_config(&cli.config)?;
    let session = runtime::connect_session(&config).await?;

    let result = session.browse(args.node.as_deref()).await;
    session.disconnect().await;

    let children = result?;
    if children.is_empty() {
        println!("(no children)");
    } else {
        for child in &children {
            println!("{}", child);
        }
    }

    Ok(())
}
