use std::sync::Arc;

use chrono::{DateTime, Utc};
use sentinel_purger_application::{AccessTokenProvider, PurgeRunSummary, RetentionPurgeService};
use sentinel_purger_core::{AppError, AppResult};
use sentinel_purger_infrastructure::{
    AzureClientSecretTokenProvider, HttpPurgeGateway, management_scope_for,
};
use tracing::info;

use crate::purger_config::PurgerConfig;


/// Runs a purge against Azure using the configured service principal.
pub async fn run(config: &PurgerConfig, now: DateTime<Utc>) -> AppResult<PurgeRunSummary> {
    let token_provider = AzureClientSecretTokenProvider::new(
        &config.credentials,
        management_scope_for(config.management_endpoint.as_str()),
    )?;

    run_with_token_provider(config, Arc::new(token_provider), now).await
}

/// Runs a purge with an explicit token provider.
pub async fn run_with_token_provider(
    config: &PurgerConfig,
    token_provider: Arc<dyn AccessTokenProvider>,
    now: DateTime<Utc>,
) -> AppResult<PurgeRunSummary> {
    let http_client = reqwest::Client::builder()
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let gateway = HttpPurgeGateway::new(
        http_client,
        token_provider,
        config.management_endpoint.as_str(),
        config.workspace.clone(),
    )?;
    let service = RetentionPurgeService::new(Arc::new(gateway));

    info!(
        subscription_id = %config.workspace.subscription_id,
        resource_group = %config.workspace.resource_group,
        workspace = %config.workspace.workspace_name,
        tables = config.entries.len(),
        "sentinel-purger started"
    );

    service.run(&config.entries, now).await
}
