// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use tapline_config::{StoreConfig, TaplineConfig};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    // Check if file exists
    if !config_path.exists() {
        return Err(BinError::Configuration(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    // Load and validate configuration
    let config = tapline_config::load_config(config_path).map_err(|e| {
        BinError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    let warnings = collect_warnings(&config);

    // Output results based on format
    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Endpoint:   {}", config.client.endpoint);
            println!("  Store:      {}", config.store.backend_name());
            println!(
                "  Historian:  {} node(s) at {} ms{}",
                config.historian.nodes.len(),
                config.historian.interval_ms,
                if config.historian.autostart {
                    " (autostart)"
                } else {
                    ""
                }
            );
            println!(
                "  API:        {}",
                if config.api.enabled {
                    config.api.socket_addr().to_string()
                } else {
                    "disabled".to_string()
                }
            );
            println!(
                "  Logging:    {} ({:?})",
                config.logging.level.as_str(),
                config.logging.format
            );

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "endpoint": config.client.endpoint,
                    "store_backend": config.store.backend_name(),
                    "historian_nodes": config.historian.nodes.len(),
                    "historian_interval_ms": config.historian.interval_ms,
                    "autostart": config.historian.autostart,
                    "api_enabled": config.api.enabled,
                    "api_address": config.api.socket_addr().to_string(),
                    "log_level": config.logging.level.as_str(),
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
        }
    }

    // In strict mode, treat warnings as errors
    if args.strict && !warnings.is_empty() {
        return Err(BinError::Configuration(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

/// Collects non-fatal issues a valid config can still carry.
fn collect_warnings(config: &TaplineConfig) -> Vec<String> {
    let mut warnings: Vec<String> = Vec::new();

    if config.historian.nodes.is_empty() {
        warnings.push("No historian nodes configured; collection will idle".to_string());
    }

    if !config.api.enabled && !config.historian.autostart {
        warnings.push(
            "API is disabled and autostart is off; nothing will start collection".to_string(),
        );
    }

    if matches!(config.store, StoreConfig::Csv(_)) {
        warnings.push(
            "CSV store is append-only; history queries need the sqlite or memory backend"
                .to_string(),
        );
    }

    if !config.client.endpoint.starts_with("sim://") {
        warnings.push(format!(
            "Endpoint '{}' is not a built-in scheme; a matching transport must be provided",
            config.client.endpoint
        ));
    }

    if let Some(file) = &config.logging.file {
        if let Some(parent) = file.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                warnings.push(format!(
                    "Log directory does not exist: {}",
                    parent.display()
                ));
            }
        }
    }

    warnings
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tapline_config::CsvStoreConfig;

    #[test]
    fn test_no_warnings_for_testing_config() {
        let mut config = TaplineConfig::for_testing();
        config.historian.nodes = vec!["ns=2;s=Temp".to_string()];
        config.historian.autostart = true;

        assert!(collect_warnings(&config).is_empty());
    }

    #[test]
    fn test_warns_on_empty_nodes() {
        let mut config = TaplineConfig::for_testing();
        config.historian.autostart = true;
        config.historian.nodes.clear();

        let warnings = collect_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("No historian nodes")));
    }

    #[test]
    fn test_warns_when_nothing_starts_collection() {
        let mut config = TaplineConfig::for_testing();
        config.historian.nodes = vec!["ns=2;s=Temp".to_string()];
        config.api.enabled = false;
        config.historian.autostart = false;

        let warnings = collect_warnings(&config);
        assert!(warnings
            .iter()
            .any(|w| w.contains("nothing will start collection")));
    }

    #[test]
    fn test_warns_on_csv_store() {
        let mut config = TaplineConfig::for_testing();
        config.historian.nodes = vec!["ns=2;s=Temp".to_string()];
        config.historian.autostart = true;
        config.store = StoreConfig::Csv(CsvStoreConfig {
            path: "history.csv".into(),
        });

        let warnings = collect_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("CSV store")));
    }

    #[test]
    fn test_warns_on_foreign_endpoint_scheme() {
        let mut config = TaplineConfig::for_testing();
        config.historian.nodes = vec!["ns=2;s=Temp".to_string()];
        config.historian.autostart = true;
        config.client.endpoint = "opc.tcp://plant:4840".to_string();

        let warnings = collect_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("not a built-in scheme")));
    }
}
