use std::sync::Arc;

use async_trait::async_trait;
use azure_core::credentials::{Secret, TokenCredential};
use azure_identity::ClientSecretCredential;
use sentinel_purger_application::AccessTokenProvider;
use sentinel_purger_core::{AppError, AppResult};
use tracing::debug;

/// OAuth scope of the public-cloud Azure Resource Manager API.
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Service principal credentials used for the client-credential exchange.
#[derive(Clone)]
pub struct ServicePrincipalCredentials {
    /// Azure AD tenant (directory) id.
    pub tenant_id: String,
    /// Application (client) id.
    pub client_id: String,
    /// Client secret value.
    pub client_secret: String,
}

impl std::fmt::Debug for ServicePrincipalCredentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ServicePrincipalCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Access token provider backed by an Azure AD client secret credential.
///
/// Every call performs a token request; no token is cached between calls.
pub struct AzureClientSecretTokenProvider {
    credential: Arc<ClientSecretCredential>,
    scope: String,
}

impl std::fmt::Debug for AzureClientSecretTokenProvider {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AzureClientSecretTokenProvider")
            .field("scope", &self.scope)
            .finish()
    }
}

impl AzureClientSecretTokenProvider {
    /// Creates a provider requesting tokens for `scope`.
    pub fn new(
        credentials: &ServicePrincipalCredentials,
        scope: impl Into<String>,
    ) -> AppResult<Self> {
        let credential = ClientSecretCredential::new(
            credentials.tenant_id.as_str(),
            credentials.client_id.clone(),
            Secret::new(credentials.client_secret.clone()),
            None,
        )
        .map_err(|error| {
            AppError::Auth(format!("could not create client secret credential: {error}"))
        })?;

        Ok(Self {
            credential,
            scope: scope.into(),
        })
    }

    /// Returns the OAuth scope tokens are requested for.
    #[must_use]
    pub fn scope(&self) -> &str {
        self.scope.as_str()
    }
}

#[async_trait]
impl AccessTokenProvider for AzureClientSecretTokenProvider {
    async fn access_token(&self) -> AppResult<String> {
        let scopes = [self.scope.as_str()];
        let access_token = self
            .credential
            .get_token(&scopes, None)
            .await
            .map_err(|error| AppError::Auth(format!("could not get token: {error}")))?;

        debug!(scope = %self.scope, "acquired management API token");

        Ok(access_token.token.secret().to_owned())
    }
}

/// Derives the `.default` scope of a management endpoint.
#[must_use]
pub fn management_scope_for(endpoint: &str) -> String {
    format!("{}/.default", endpoint.trim_end_matches('/'))
}
