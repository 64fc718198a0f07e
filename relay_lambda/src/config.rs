use std::path::PathBuf;

const DESTINATION_BUCKET_VAR: &str = "DST_BUCKET";
const STAGING_DIR_VAR: &str = "STAGING_DIR";
const DEFAULT_STAGING_DIR: &str = "/tmp";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} must be set to a non-empty value")]
    Missing(&'static str),
}

/// Settings resolved once at cold start and shared by every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub destination_bucket: String,
    pub staging_dir: PathBuf,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let destination_bucket = lookup(DESTINATION_BUCKET_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing(DESTINATION_BUCKET_VAR))?;
        let staging_dir = lookup(STAGING_DIR_VAR)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STAGING_DIR.to_string());
        Ok(RelayConfig {
            destination_bucket,
            staging_dir: PathBuf::from(staging_dir),
        })
    }
}
