//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod azure_token_provider;
mod http_purge_gateway;

pub use azure_token_provider::{
    AzureClientSecretTokenProvider, MANAGEMENT_SCOPE, ServicePrincipalCredentials,
    management_scope_for,
};
pub use http_purge_gateway::{
    ASYNC_OPERATION_HEADER, HttpPurgeGateway, LogAnalyticsWorkspace, PURGE_API_VERSION,
};
