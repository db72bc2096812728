use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinel_purger_core::AppResult;
use sentinel_purger_domain::{PurgeOperation, PurgeStatus, TableName};

/// Port issuing bearer tokens for the management API.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Requests a fresh access token. Implementations do not cache.
    async fn access_token(&self) -> AppResult<String>;
}

/// Port for the workspace purge API.
#[async_trait]
pub trait PurgeGateway: Send + Sync {
    /// Submits a delete-data job removing rows of `table` older than `threshold`.
    async fn submit_purge(
        &self,
        table: &TableName,
        threshold: DateTime<Utc>,
    ) -> AppResult<PurgeOperation>;

    /// Fetches the current status of an accepted purge job.
    async fn fetch_status(&self, operation: &PurgeOperation) -> AppResult<PurgeStatus>;
}
