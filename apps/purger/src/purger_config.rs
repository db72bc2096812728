use std::fs;
use std::path::Path;
use std::str::FromStr;

use sentinel_purger_core::{AppError, AppResult};
use sentinel_purger_domain::RetentionEntry;
use sentinel_purger_infrastructure::{LogAnalyticsWorkspace, ServicePrincipalCredentials};
use serde::Deserialize;
use tracing::Level;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Raw shape of the YAML configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    log: LogSection,
    microsoft: MicrosoftSection,
    tables: Vec<TableSection>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LogSection {
    level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_owned(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MicrosoftSection {
    tenant_id: String,
    app_id: String,
    secret_key: String,
    subscription_id: String,
    resource_group: String,
    workspace_name: String,
    management_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSection {
    name: String,
    retention: String,
}

/// Validated runtime configuration of a purge run.
#[derive(Debug, Clone)]
pub struct PurgerConfig {
    pub log_level: String,
    pub credentials: ServicePrincipalCredentials,
    pub workspace: LogAnalyticsWorkspace,
    pub management_endpoint: String,
    pub entries: Vec<RetentionEntry>,
}

impl PurgerConfig {
    /// Reads, overrides from the process environment, and validates `path`.
    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path).map_err(|error| {
            AppError::Config(format!(
                "could not read configuration file '{}': {error}",
                path.display()
            ))
        })?;

        Self::from_yaml(contents.as_str(), |name| std::env::var(name).ok())
    }

    /// Parses YAML, applies overrides from `lookup_env`, and validates.
    pub fn from_yaml(
        contents: &str,
        lookup_env: impl Fn(&str) -> Option<String>,
    ) -> AppResult<Self> {
        let mut file: ConfigFile = serde_yaml::from_str(contents)
            .map_err(|error| AppError::Config(format!("could not parse configuration: {error}")))?;

        file.apply_env_overrides(lookup_env);
        file.validate()
    }
}

impl ConfigFile {
    fn apply_env_overrides(&mut self, lookup_env: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup_env(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = lookup("LOG_LEVEL") {
            self.log.level = value;
        }

        let microsoft = &mut self.microsoft;
        for (name, field) in [
            ("MS_TENANT_ID", &mut microsoft.tenant_id),
            ("MS_APP_ID", &mut microsoft.app_id),
            ("MS_SECRET_KEY", &mut microsoft.secret_key),
            ("MS_SUB_ID", &mut microsoft.subscription_id),
            ("MS_RESOURCE_GROUP", &mut microsoft.resource_group),
            ("MS_WORKSPACE_NAME", &mut microsoft.workspace_name),
        ] {
            if let Some(value) = lookup(name) {
                *field = value;
            }
        }

        if let Some(value) = lookup("MS_MANAGEMENT_ENDPOINT") {
            microsoft.management_endpoint = Some(value);
        }
    }

    fn validate(self) -> AppResult<PurgerConfig> {
        let microsoft = self.microsoft;
        for (key, value) in [
            ("microsoft.tenant_id", &microsoft.tenant_id),
            ("microsoft.app_id", &microsoft.app_id),
            ("microsoft.secret_key", &microsoft.secret_key),
            ("microsoft.subscription_id", &microsoft.subscription_id),
            ("microsoft.resource_group", &microsoft.resource_group),
            ("microsoft.workspace_name", &microsoft.workspace_name),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{key} is required")));
            }
        }

        if self.tables.is_empty() {
            return Err(AppError::Config(
                "at least one table must be configured".to_owned(),
            ));
        }

        let mut entries: Vec<RetentionEntry> = Vec::with_capacity(self.tables.len());
        for table in self.tables {
            let entry = RetentionEntry::new(table.name, table.retention.as_str())
                .map_err(|error| match error {
                    AppError::Validation(message) => AppError::Config(message),
                    other => other,
                })?;

            if entries
                .iter()
                .any(|existing| existing.table() == entry.table())
            {
                return Err(AppError::Config(format!(
                    "table '{}' is configured more than once",
                    entry.table()
                )));
            }

            entries.push(entry);
        }

        let management_endpoint = microsoft
            .management_endpoint
            .map(|endpoint| endpoint.trim().trim_end_matches('/').to_owned())
            .filter(|endpoint| !endpoint.is_empty())
            .unwrap_or_else(|| DEFAULT_MANAGEMENT_ENDPOINT.to_owned());

        Ok(PurgerConfig {
            log_level: self.log.level,
            credentials: ServicePrincipalCredentials {
                tenant_id: microsoft.tenant_id.trim().to_owned(),
                client_id: microsoft.app_id.trim().to_owned(),
                client_secret: microsoft.secret_key,
            },
            workspace: LogAnalyticsWorkspace {
                subscription_id: microsoft.subscription_id.trim().to_owned(),
                resource_group: microsoft.resource_group.trim().to_owned(),
                workspace_name: microsoft.workspace_name.trim().to_owned(),
            },
            management_endpoint,
            entries,
        })
    }
}

/// Maps a configured level name onto a tracing level.
///
/// `fatal` and `panic` are accepted as aliases of `error`.
pub fn parse_log_level(value: &str) -> Option<Level> {
    let normalized = value.trim().to_lowercase();
    match normalized.as_str() {
        "fatal" | "panic" => Some(Level::ERROR),
        "warning" => Some(Level::WARN),
        other => Level::from_str(other).ok(),
    }
}
