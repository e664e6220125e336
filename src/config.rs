use crate::app_env;
use std::path::PathBuf;
use thiserror::Error;

const DATA_DIR_NAME: &str = "taskflow";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be either \"remote\" or \"local\", got \"{1}\"")]
    UnknownBackend(&'static str, String),
    #[error("{0} must be set when using the remote backend")]
    Missing(&'static str),
    #[error("no data directory could be determined, set {0}")]
    NoDataDir(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Remote {
        api_url: String,
        application_id: String,
        api_token: Option<String>,
    },
    Local {
        data_dir: PathBuf,
    },
}

/// OTLP endpoints for traces and metrics. Exporting only happens when both are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtelEndpoints {
    pub spans: String,
    pub metrics: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub otel: Option<OtelEndpoints>,
}

impl AppConfig {
    /// Reads configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through [lookup], which returns the value of a variable if it is set.
    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let backend = match lookup(app_env::BACKEND).as_deref().map(str::trim) {
            None | Some("local") => BackendConfig::Local {
                data_dir: match lookup(app_env::DATA_DIR) {
                    Some(dir) => PathBuf::from(dir),
                    None => dirs::data_dir()
                        .ok_or(ConfigError::NoDataDir(app_env::DATA_DIR))?
                        .join(DATA_DIR_NAME),
                },
            },
            Some("remote") => BackendConfig::Remote {
                api_url: lookup(app_env::API_URL).ok_or(ConfigError::Missing(app_env::API_URL))?,
                application_id: lookup(app_env::APP_ID)
                    .ok_or(ConfigError::Missing(app_env::APP_ID))?,
                api_token: lookup(app_env::API_TOKEN),
            },
            Some(other) => {
                return Err(ConfigError::UnknownBackend(app_env::BACKEND, other.to_owned()));
            }
        };

        let otel = match (
            lookup(app_env::OTEL_SPAN_EXPORT_URL),
            lookup(app_env::OTEL_METRIC_EXPORT_URL),
        ) {
            (Some(spans), Some(metrics)) => Some(OtelEndpoints { spans, metrics }),
            _ => None,
        };

        Ok(AppConfig { backend, otel })
    }
}
