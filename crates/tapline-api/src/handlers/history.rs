// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! History query handlers.
//!
//! One endpoint, two modes: `?last=N` returns the N most recent
//! points (newest first); `?start=..&end=..[&bucket_secs=..]` returns
//! the ascending range, downsampled to the newest point per bucket
//! when a width is given. `start`/`end` accept epoch seconds (integer
//! or fractional) and ISO-8601 text.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use tapline_core::convert::TimeSpec;
use tapline_store::{HistoryPoint, HistorySink};

use crate::error::{ApiError, ApiResult};
use crate::response::{ApiResponse, ResponseMeta};
use crate::state::AppState;

// =============================================================================
// Query Parameters
// =============================================================================

/// Query parameters for history reads.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    /// Return the N most recent points instead of a range.
    pub last: Option<u32>,
    /// Range start; epoch seconds or ISO-8601.
    pub start: Option<String>,
    /// Range end; epoch seconds or ISO-8601.
    pub end: Option<String>,
    /// Downsampling bucket width in seconds.
    pub bucket_secs: Option<u64>,
}

/// Parses a query-string timestamp: epoch integer, then fractional
/// epoch, then text.
fn parse_time_param(name: &str, raw: &str) -> ApiResult<DateTime<Utc>> {
    let spec = if let Ok(secs) = raw.parse::<i64>() {
        TimeSpec::Int(secs)
    } else if let Ok(secs) = raw.parse::<f64>() {
        TimeSpec::Float(secs)
    } else {
        TimeSpec::Text(raw.to_string())
    };
    spec.to_utc()
        .map_err(|e| ApiError::bad_request(format!("{}: {}", name, e)))
}

// =============================================================================
// Query History
// =============================================================================

/// GET /api/v1/history/{node_id}
///
/// Queries stored history for the node.
pub async fn query_history(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<ApiResponse<Vec<HistoryPoint>>>> {
    let has_range = params.start.is_some() || params.end.is_some();

    let points = match params.last {
        Some(_) if has_range => {
            return Err(ApiError::bad_request(
                "last and start/end are mutually exclusive",
            ));
        }
        Some(n) => state.sink().query_last_n(&node_id, n).await?,
        None => {
            let (start_raw, end_raw) = match (&params.start, &params.end) {
                (Some(s), Some(e)) => (s, e),
                _ => {
                    return Err(ApiError::bad_request(
                        "either last or both start and end are required",
                    ));
                }
            };
            let start = parse_time_param("start", start_raw)?;
            let end = parse_time_param("end", end_raw)?;
            if start > end {
                return Err(ApiError::bad_request("start must not be after end"));
            }
            let bucket = params.bucket_secs.map(Duration::from_secs);
            state
                .sink()
                .query_range(&node_id, start, end, bucket)
                .await?
        }
    };

    let meta = ResponseMeta::count(points.len() as u64);
    Ok(Json(ApiResponse::success(points).with_meta(meta)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing;
    use axum::http::StatusCode;
    use chrono::TimeZone;
    use tapline_core::types::TagValue;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    async fn seeded() -> testing::TestHarness {
        let harness = testing::harness();
        harness
            .sink
            .insert_batch(&[
                HistoryPoint::new("n1", at(100), TagValue::Int(1)),
                HistoryPoint::new("n1", at(150), TagValue::Int(2)),
                HistoryPoint::new("n1", at(200), TagValue::Int(3)),
                HistoryPoint::new("n2", at(120), TagValue::Int(9)),
            ])
            .await
            .unwrap();
        harness
    }

    fn range_params(start: &str, end: &str) -> HistoryParams {
        HistoryParams {
            start: Some(start.to_string()),
            end: Some(end.to_string()),
            ..HistoryParams::default()
        }
    }

    #[tokio::test]
    async fn test_range_query_epoch_seconds() {
        let harness = seeded().await;
        let response = query_history(
            State(harness.state),
            Path("n1".to_string()),
            Query(range_params("100", "160")),
        )
        .await
        .unwrap()
        .0;

        let points = response.data.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, TagValue::Int(1));
        assert_eq!(points[1].value, TagValue::Int(2));
        assert_eq!(response.meta.unwrap().total, Some(2));
    }

    #[tokio::test]
    async fn test_range_query_iso_text() {
        let harness = seeded().await;
        let response = query_history(
            State(harness.state),
            Path("n1".to_string()),
            Query(range_params("1970-01-01T00:00:00Z", "1970-01-01T01:00:00Z")),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(response.data.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_range_query_with_bucket_keeps_newest() {
        let harness = seeded().await;
        let mut params = range_params("0", "300");
        params.bucket_secs = Some(100);
        let response = query_history(State(harness.state), Path("n1".to_string()), Query(params))
            .await
            .unwrap()
            .0;

        // Buckets [100,200) and [200,300): newest of each.
        let points = response.data.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, TagValue::Int(2));
        assert_eq!(points[1].value, TagValue::Int(3));
    }

    #[tokio::test]
    async fn test_last_n_newest_first() {
        let harness = seeded().await;
        let response = query_history(
            State(harness.state),
            Path("n1".to_string()),
            Query(HistoryParams {
                last: Some(2),
                ..HistoryParams::default()
            }),
        )
        .await
        .unwrap()
        .0;

        let points = response.data.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, TagValue::Int(3));
        assert_eq!(points[1].value, TagValue::Int(2));
    }

    #[tokio::test]
    async fn test_last_and_range_are_exclusive() {
        let harness = seeded().await;
        let mut params = range_params("0", "300");
        params.last = Some(5);
        let err = query_history(State(harness.state), Path("n1".to_string()), Query(params))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_bounds_rejected() {
        let harness = seeded().await;
        let err = query_history(
            State(harness.state),
            Path("n1".to_string()),
            Query(HistoryParams {
                start: Some("100".to_string()),
                ..HistoryParams::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_garbage_timestamp_rejected() {
        let harness = seeded().await;
        let err = query_history(
            State(harness.state),
            Path("n1".to_string()),
            Query(range_params("yesterday-ish", "200")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_inverted_range_rejected() {
        let harness = seeded().await;
        let err = query_history(
            State(harness.state),
            Path("n1".to_string()),
            Query(range_params("300", "100")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
