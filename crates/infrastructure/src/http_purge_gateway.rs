use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, header};
use sentinel_purger_application::{AccessTokenProvider, PurgeGateway};
use sentinel_purger_core::{AppError, AppResult};
use sentinel_purger_domain::{PurgeOperation, PurgeRequest, PurgeStatus, TableName};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

#[cfg(test)]
mod tests;

/// API version of the table-scoped delete-data endpoint.
pub const PURGE_API_VERSION: &str = "2023-09-01";

/// Response header carrying the operation URL of an accepted purge.
pub const ASYNC_OPERATION_HEADER: &str = "Azure-AsyncOperation";

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(180);
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Coordinates of the Log Analytics workspace owning the purged tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogAnalyticsWorkspace {
    /// Azure subscription id.
    pub subscription_id: String,
    /// Resource group containing the workspace.
    pub resource_group: String,
    /// Workspace name.
    pub workspace_name: String,
}

#[derive(Debug, Deserialize)]
struct PurgeStatusDocument {
    status: Option<String>,
    properties: Option<PurgeStatusProperties>,
}

#[derive(Debug, Deserialize)]
struct PurgeStatusProperties {
    status: Option<String>,
}

impl PurgeStatusDocument {
    fn into_status(self) -> Option<String> {
        self.status
            .filter(|status| !status.trim().is_empty())
            .or_else(|| self.properties.and_then(|properties| properties.status))
    }
}

/// Purge gateway talking to the Azure Resource Manager REST API.
pub struct HttpPurgeGateway {
    http_client: reqwest::Client,
    token_provider: Arc<dyn AccessTokenProvider>,
    management_endpoint: Url,
    workspace: LogAnalyticsWorkspace,
}

impl HttpPurgeGateway {
    /// Creates a gateway for `workspace` behind `management_endpoint`.
    pub fn new(
        http_client: reqwest::Client,
        token_provider: Arc<dyn AccessTokenProvider>,
        management_endpoint: &str,
        workspace: LogAnalyticsWorkspace,
    ) -> AppResult<Self> {
        let management_endpoint = Url::parse(management_endpoint).map_err(|error| {
            AppError::Config(format!(
                "invalid management endpoint '{management_endpoint}': {error}"
            ))
        })?;

        if management_endpoint.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "management endpoint '{management_endpoint}' cannot carry a resource path"
            )));
        }

        Ok(Self {
            http_client,
            token_provider,
            management_endpoint,
            workspace,
        })
    }

    /// Returns the delete-data URL of `table`.
    pub fn purge_url(&self, table: &TableName) -> AppResult<Url> {
        let mut url = self.management_endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AppError::Config("management endpoint cannot carry a resource path".to_owned())
            })?
            .pop_if_empty()
            .extend([
                "subscriptions",
                self.workspace.subscription_id.as_str(),
                "resourceGroups",
                self.workspace.resource_group.as_str(),
                "providers",
                "Microsoft.OperationalInsights",
                "workspaces",
                self.workspace.workspace_name.as_str(),
                "tables",
                table.as_str(),
                "deleteData",
            ]);
        url.query_pairs_mut()
            .clear()
            .append_pair("api-version", PURGE_API_VERSION);

        Ok(url)
    }

    async fn bearer_header(&self) -> AppResult<String> {
        let token = self.token_provider.access_token().await?;
        Ok(format!("Bearer {token}"))
    }
}

#[async_trait]
impl PurgeGateway for HttpPurgeGateway {
    async fn submit_purge(
        &self,
        table: &TableName,
        threshold: DateTime<Utc>,
    ) -> AppResult<PurgeOperation> {
        let url = self.purge_url(table)?;
        let payload = PurgeRequest::older_than(threshold).to_json()?;
        let authorization = self.bearer_header().await?;

        info!(table = %table, "purge requested");

        let response = self
            .http_client
            .post(url)
            .header(header::AUTHORIZATION, authorization)
            .header(header::CONTENT_TYPE, "application/json")
            .body(payload)
            .timeout(SUBMIT_TIMEOUT)
            .send()
            .await
            .map_err(|error| {
                AppError::Transport(format!("could not send purge request: {error}"))
            })?;

        let status = response.status();
        let operation_url = response
            .headers()
            .get(ASYNC_OPERATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .map(str::to_owned);
        let body = response.text().await.map_err(|error| {
            AppError::Transport(format!("could not read purge response body: {error}"))
        })?;

        if status != StatusCode::ACCEPTED {
            debug!(table = %table, status = status.as_u16(), body = %body, "purge response");
            return Err(AppError::PurgeSubmit {
                status: status.as_u16(),
                body,
            });
        }

        match operation_url.filter(|url| !url.is_empty()) {
            Some(operation_url) => PurgeOperation::new(operation_url),
            None => Err(AppError::MissingOperationHandle(format!(
                "purge response is missing the '{ASYNC_OPERATION_HEADER}' header"
            ))),
        }
    }

    async fn fetch_status(&self, operation: &PurgeOperation) -> AppResult<PurgeStatus> {
        let url = Url::parse(operation.operation_url()).map_err(|error| {
            AppError::MissingOperationHandle(format!(
                "invalid operation URL '{}': {error}",
                operation.operation_url()
            ))
        })?;
        let authorization = self.bearer_header().await?;

        debug!(operation_url = %url, "checking purge status");

        let response = self
            .http_client
            .get(url)
            .header(header::AUTHORIZATION, authorization)
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
            .map_err(|error| {
                AppError::Transport(format!("could not send purge status request: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            AppError::Transport(format!(
                "could not read purge status body (status={}): {error}",
                status.as_u16()
            ))
        })?;

        if status != StatusCode::OK {
            return Err(AppError::StatusFetch {
                status: status.as_u16(),
                body,
            });
        }

        let document: PurgeStatusDocument = serde_json::from_str(body.as_str())
            .map_err(|error| AppError::StatusParse(format!("invalid status document: {error}")))?;

        let raw_status = document.into_status().unwrap_or_default();
        PurgeStatus::parse(raw_status.as_str())
    }
}
