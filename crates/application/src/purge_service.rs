//! Retention purge orchestration.
//!
//! Tables are processed strictly in configuration order. Each purge is
//! submitted and its job status checked exactly once before moving on; the
//! first failure aborts the run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sentinel_purger_core::AppResult;
use sentinel_purger_domain::{
    PurgeOperation, PurgeStatus, RetentionEntry, TableName, format_threshold,
};
use tracing::info;

use crate::purge_ports::PurgeGateway;


/// Result of purging one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Purged table.
    pub table: TableName,
    /// Rows generated before this instant were targeted.
    pub threshold: DateTime<Utc>,
    /// Handle of the accepted purge job.
    pub operation: PurgeOperation,
    /// Job status observed right after submission.
    pub status: PurgeStatus,
}

/// Outcomes of a complete run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeRunSummary {
    /// One outcome per configured table.
    pub outcomes: Vec<PurgeOutcome>,
}

impl PurgeRunSummary {
    /// Number of tables a purge job was registered for.
    #[must_use]
    pub fn purged_tables(&self) -> usize {
        self.outcomes.len()
    }
}

/// Application service purging tables past their retention window.
#[derive(Clone)]
pub struct RetentionPurgeService {
    gateway: Arc<dyn PurgeGateway>,
}

impl RetentionPurgeService {
    /// Creates a service from a purge gateway implementation.
    #[must_use]
    pub fn new(gateway: Arc<dyn PurgeGateway>) -> Self {
        Self { gateway }
    }

    /// Purges every entry in order, measuring all thresholds against `now`.
    pub async fn run(
        &self,
        entries: &[RetentionEntry],
        now: DateTime<Utc>,
    ) -> AppResult<PurgeRunSummary> {
        let mut summary = PurgeRunSummary::default();

        for entry in entries {
            let outcome = self.purge_table(entry, now).await?;
            summary.outcomes.push(outcome);
        }

        Ok(summary)
    }

    /// Submits the purge for one table and checks the job status once.
    pub async fn purge_table(
        &self,
        entry: &RetentionEntry,
        now: DateTime<Utc>,
    ) -> AppResult<PurgeOutcome> {
        let table = entry.table();
        let context = format!("table '{table}'");
        let threshold = entry.threshold_from(now)?;

        info!(
            table = %table,
            threshold = %format_threshold(threshold),
            "found table"
        );

        let operation = self
            .gateway
            .submit_purge(table, threshold)
            .await
            .map_err(|error| error.with_context(&context))?;

        let status = self
            .gateway
            .fetch_status(&operation)
            .await
            .and_then(PurgeStatus::ensure_in_flight)
            .map_err(|error| error.with_context(&context))?;

        info!(
            table = %table,
            status = %status,
            operation_url = %operation.operation_url(),
            "purge job registered"
        );

        Ok(PurgeOutcome {
            table: table.clone(),
            threshold,
            operation,
            status,
        })
    }
}
