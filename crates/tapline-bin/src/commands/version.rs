// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("tapline - industrial telemetry client and historian");
    println!();
    println!("Version Information:");
    println!("  tapline-bin:       {}", env!("CARGO_PKG_VERSION"));
    println!("  tapline-core:      {}", tapline_core::VERSION);
    println!("  tapline-client:    {}", tapline_client::VERSION);
    println!("  tapline-historian: {}", tapline_historian::VERSION);
    println!("  tapline-store:     {}", tapline_store::VERSION);
    println!("  tapline-config:    {}", tapline_config::VERSION);
    println!("  tapline-api:       {}", tapline_api::VERSION);
    println!();
    println!("Build Information:");
    println!("  Rust Edition: 2021");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");
    println!();
    println!("For commercial licensing, contact: contact@sylvex.io");

    Ok(())
}
