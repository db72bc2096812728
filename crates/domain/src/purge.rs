//! Purge request payloads, operation handles and job status.

use chrono::{DateTime, SecondsFormat, Utc};
use sentinel_purger_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Column every purge filter is applied to.
pub const TIME_GENERATED_COLUMN: &str = "TimeGenerated";

/// Comparison operator selecting rows older than the threshold.
pub const OLDER_THAN_OPERATOR: &str = "<";

/// Renders a threshold the way the purge API expects it: UTC, second precision.
#[must_use]
pub fn format_threshold(threshold: DateTime<Utc>) -> String {
    threshold.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A single filter clause of a purge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeFilter {
    /// Column the clause applies to.
    pub column: String,
    /// Comparison operator.
    pub operator: String,
    /// Right-hand side of the comparison.
    pub value: String,
}

/// Body of a table-scoped delete-data request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeRequest {
    /// Filter clauses; always exactly one `TimeGenerated < threshold`.
    pub filters: Vec<PurgeFilter>,
}

impl PurgeRequest {
    /// Builds a request deleting every row generated before `threshold`.
    #[must_use]
    pub fn older_than(threshold: DateTime<Utc>) -> Self {
        Self {
            filters: vec![PurgeFilter {
                column: TIME_GENERATED_COLUMN.to_owned(),
                operator: OLDER_THAN_OPERATOR.to_owned(),
                value: format_threshold(threshold),
            }],
        }
    }

    /// Serializes the request into its JSON wire form.
    pub fn to_json(&self) -> AppResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|error| {
            AppError::Internal(format!("could not serialize purge request: {error}"))
        })
    }
}

/// Handle of an accepted asynchronous purge job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeOperation {
    operation_url: NonEmptyString,
}

impl PurgeOperation {
    /// Creates a handle from the operation URL returned by the purge endpoint.
    pub fn new(operation_url: impl Into<String>) -> AppResult<Self> {
        let operation_url = NonEmptyString::new(operation_url).map_err(|_| {
            AppError::MissingOperationHandle("operation URL must not be empty".to_owned())
        })?;

        Ok(Self { operation_url })
    }

    /// Returns the URL the job status can be fetched from.
    #[must_use]
    pub fn operation_url(&self) -> &str {
        self.operation_url.as_str()
    }
}

/// Normalized (lowercase) status of a purge job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeStatus(String);

impl PurgeStatus {
    /// Job is queued.
    pub const PENDING: &'static str = "pending";
    /// Job is running.
    pub const UPDATING: &'static str = "updating";

    /// Normalizes a raw status value.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(AppError::StatusParse("empty purge status".to_owned()));
        }

        Ok(Self(normalized))
    }

    /// Returns the lowercase status value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether the job is still queued or running.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self.0.as_str(), Self::PENDING | Self::UPDATING)
    }

    /// Accepts in-flight statuses and rejects everything else.
    ///
    /// Purges are checked once right after submission, so a terminal status
    /// such as `succeeded` is unexpected and reported as an error.
    pub fn ensure_in_flight(self) -> AppResult<Self> {
        if self.is_in_flight() {
            Ok(self)
        } else {
            Err(AppError::UnrecognizedStatus(self.0))
        }
    }
}

impl std::fmt::Display for PurgeStatus {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use sentinel_purger_core::AppError;

    use super::{PurgeOperation, PurgeRequest, PurgeStatus, format_threshold};
    use crate::RetentionPeriod;

    #[test]
    fn request_contains_single_time_generated_filter() {
        let threshold = Utc
            .with_ymd_and_hms(2024, 1, 31, 23, 59, 58)
            .single()
            .unwrap_or_else(|| unreachable!());

        let bytes = PurgeRequest::older_than(threshold)
            .to_json()
            .unwrap_or_else(|_| unreachable!());
        let decoded: PurgeRequest =
            serde_json::from_slice(&bytes).unwrap_or_else(|_| unreachable!());

        assert_eq!(decoded.filters.len(), 1);
        assert_eq!(decoded.filters[0].column, "TimeGenerated");
        assert_eq!(decoded.filters[0].operator, "<");
        assert_eq!(decoded.filters[0].value, "2024-01-31T23:59:58Z");
    }

    #[test]
    fn request_wire_form_has_only_filters() {
        let threshold = Utc
            .with_ymd_and_hms(2023, 6, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(|| unreachable!());

        let bytes = PurgeRequest::older_than(threshold)
            .to_json()
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(
            String::from_utf8(bytes).unwrap_or_default(),
            r#"{"filters":[{"column":"TimeGenerated","operator":"<","value":"2023-06-01T00:00:00Z"}]}"#
        );
    }

    #[test]
    fn threshold_format_drops_subsecond_precision() {
        let threshold = Utc
            .with_ymd_and_hms(2024, 2, 29, 8, 5, 3)
            .single()
            .unwrap_or_else(|| unreachable!())
            + Duration::milliseconds(987);

        assert_eq!(format_threshold(threshold), "2024-02-29T08:05:03Z");
    }

    #[test]
    fn status_is_lowercased() {
        let status = PurgeStatus::parse("Updating").unwrap_or_else(|_| unreachable!());
        assert_eq!(status.as_str(), "updating");
        assert!(status.is_in_flight());
    }

    #[test]
    fn empty_status_is_a_parse_error() {
        assert!(matches!(
            PurgeStatus::parse("  "),
            Err(AppError::StatusParse(_))
        ));
    }

    #[test]
    fn terminal_status_is_unrecognized() {
        for raw in ["Succeeded", "failed", "canceled"] {
            let status = PurgeStatus::parse(raw).unwrap_or_else(|_| unreachable!());
            assert!(matches!(
                status.ensure_in_flight(),
                Err(AppError::UnrecognizedStatus(_))
            ));
        }
    }

    #[test]
    fn pending_status_is_in_flight() {
        let status = PurgeStatus::parse("PENDING").unwrap_or_else(|_| unreachable!());
        assert!(status.ensure_in_flight().is_ok());
    }

    #[test]
    fn empty_operation_url_is_missing_handle() {
        assert!(matches!(
            PurgeOperation::new(""),
            Err(AppError::MissingOperationHandle(_))
        ));
    }

    proptest! {
        #[test]
        fn filter_value_matches_now_minus_retention(
            now_secs in 946_684_800_i64..4_102_444_800_i64,
            retention_secs in 0_u64..=315_360_000_u64,
        ) {
            let now = Utc.timestamp_opt(now_secs, 0).single().unwrap_or_else(|| unreachable!());
            let period = RetentionPeriod::parse(&format!("{retention_secs}s"))
                .unwrap_or_else(|_| unreachable!());

            let threshold = period.threshold_from(now).unwrap_or_else(|_| unreachable!());
            let request = PurgeRequest::older_than(threshold);

            let expected = now - Duration::seconds(i64::try_from(retention_secs).unwrap_or(0));
            prop_assert_eq!(
                request.filters[0].value.clone(),
                expected.format("%Y-%m-%dT%H:%M:%SZ").to_string()
            );
        }
    }
}
