// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `history` command.

use std::time::Duration;

use chrono::{DateTime, Utc};

use tapline_core::TimeSpec;
use tapline_store::HistorySink;

use crate::cli::{Cli, HistoryArgs};
use crate::error::{BinError, BinResult};
use crate::runtime;

/// Points returned when neither `--last` nor a range is given.
const DEFAULT_LAST_N: u32 = 10;

/// What the user asked the query to select.
#[derive(Debug, PartialEq)]
enum Selection {
    /// The N most recent points, newest first.
    LastN(u32),
    /// An inclusive time range, ascending, optionally bucketed.
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket: Option<Duration>,
    },
}

/// Executes the `history` command to query stored points.
pub async fn history(cli: &Cli, args: HistoryArgs) -> BinResult<()> {
    let selection = resolve_selection(&args)?;

    let config = tapline_config::load_config(&cli.config)?;
    let sink = runtime::open_sink(&config.store).await?;
    sink.ensure_schema().await?;

    let points = match selection {
        Selection::LastN(n) => sink.query_last_n(&args.node, n).await?,
        Selection::Range { start, end, bucket } => {
            sink.query_range(&args.node, start, end, bucket).await?
        }
    };
    sink.close().await;

    if points.is_empty() {
        println!("(no points)");
    } else {
        for point in &points {
            println!("{}  {}", point.ts.to_rfc3339(), point.value);
        }
    }

    Ok(())
}

/// Turns the CLI arguments into a query selection.
///
/// clap already rejects `--last` combined with a range and a range
/// missing one bound; with no arguments at all the most recent points
/// are returned.
fn resolve_selection(args: &HistoryArgs) -> BinResult<Selection> {
    if let Some(n) = args.last {
        return Ok(Selection::LastN(n));
    }

    match (&args.start, &args.end) {
        (Some(start), Some(end)) => {
            let start = parse_time("--start", start)?;
            let end = parse_time("--end", end)?;
            if start > end {
                return Err(BinError::Configuration(
                    "--start must not be after --end".to_string(),
                ));
            }
            Ok(Selection::Range {
                start,
                end,
                bucket: args.bucket_secs.map(Duration::from_secs),
            })
        }
        _ => Ok(Selection::LastN(DEFAULT_LAST_N)),
    }
}

/// Parses a timestamp argument: epoch seconds, fractional epoch, or an
/// ISO spelling.
fn parse_time(name: &str, raw: &str) -> BinResult<DateTime<Utc>> {
    let spec = if let Ok(int) = raw.parse::<i64>() {
        TimeSpec::Int(int)
    } else if let Ok(float) = raw.parse::<f64>() {
        TimeSpec::Float(float)
    } else {
        TimeSpec::Text(raw.to_string())
    };

    spec.to_utc()
        .map_err(|e| BinError::Configuration(format!("{}: {}", name, e)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn args(node: &str) -> HistoryArgs {
        HistoryArgs {
            node: node.to_string(),
            last: None,
            start: None,
            end: None,
            bucket_secs: None,
        }
    }

    #[test]
    fn test_parse_time_epoch_seconds() {
        let ts = parse_time("--start", "1000").unwrap();
        assert_eq!(ts, Utc.timestamp_opt(1000, 0).unwrap());
    }

    #[test]
    fn test_parse_time_iso() {
        let ts = parse_time("--start", "2025-06-01T00:00:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        let result = parse_time("--end", "yesterdayish");
        assert!(matches!(result, Err(BinError::Configuration(_))));
    }

    #[test]
    fn test_selection_defaults_to_last_n() {
        let selection = resolve_selection(&args("ns=2;s=Temp")).unwrap();
        assert_eq!(selection, Selection::LastN(DEFAULT_LAST_N));
    }

    #[test]
    fn test_selection_explicit_last() {
        let mut a = args("ns=2;s=Temp");
        a.last = Some(3);
        assert_eq!(resolve_selection(&a).unwrap(), Selection::LastN(3));
    }

    #[test]
    fn test_selection_range_with_bucket() {
        let mut a = args("ns=2;s=Temp");
        a.start = Some("1000".to_string());
        a.end = Some("2000".to_string());
        a.bucket_secs = Some(60);

        match resolve_selection(&a).unwrap() {
            Selection::Range { start, end, bucket } => {
                assert_eq!(start, Utc.timestamp_opt(1000, 0).unwrap());
                assert_eq!(end, Utc.timestamp_opt(2000, 0).unwrap());
                assert_eq!(bucket, Some(Duration::from_secs(60)));
            }
            other => panic!("expected range, got {:?}", other),
        }
    }

    #[test]
    fn test_selection_rejects_inverted_range() {
        let mut a = args("ns=2;s=Temp");
        a.start = Some("2000".to_string());
        a.end = Some("1000".to_string());

        assert!(resolve_selection(&a).is_err());
    }
}
