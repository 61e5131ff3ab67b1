//! Configuration types.
//!
//! Values are read from the environment once, in `main`, and handed to each
//! component at construction.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default timeout for a single model call.
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// LLM provider configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Absent key is reported at call time, not at startup.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let model = std::env::var("RFP_INTAKE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let timeout_secs = parse_env_or("RFP_INTAKE_LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?;

        Ok(Self {
            api_key,
            model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Storage roots.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    /// Directory uploaded attachments are written to.
    pub uploads_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/rfp-intake.db"),
            uploads_dir: PathBuf::from("./data/uploads"),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            db_path: std::env::var("RFP_INTAKE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            uploads_dir: std::env::var("RFP_INTAKE_UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.uploads_dir),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 5000 }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: parse_env_or("RFP_INTAKE_PORT", Self::default().port)?,
        })
    }
}

/// Comparison behaviour.
#[derive(Debug, Clone, Default)]
pub struct ComparisonConfig {
    /// Rank by total price when the model call fails upstream.
    pub fallback_to_price_ranking: bool,
}

impl ComparisonConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            fallback_to_price_ranking: parse_env_or("RFP_INTAKE_COMPARE_FALLBACK", false)?,
        })
    }
}

/// Everything `main` needs.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub comparison: ComparisonConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            llm: LlmConfig::from_env()?,
            storage: StorageConfig::from_env(),
            server: ServerConfig::from_env()?,
            comparison: ComparisonConfig::from_env()?,
        })
    }
}

/// Parse an env var, falling back to `default` when unset.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_defaults() {
        let config = LlmConfig::default();
        assert!(config.api_key.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn parse_env_or_uses_default_when_unset() {
        let value: u16 = parse_env_or("RFP_INTAKE_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn parse_env_or_rejects_garbage() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("RFP_INTAKE_TEST_BAD_PORT", "not-a-port") };
        let result: Result<u16, _> = parse_env_or("RFP_INTAKE_TEST_BAD_PORT", 1);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        unsafe { std::env::remove_var("RFP_INTAKE_TEST_BAD_PORT") };
    }

    #[test]
    fn storage_defaults_live_under_data() {
        let config = StorageConfig::default();
        assert!(config.db_path.starts_with("./data"));
        assert!(config.uploads_dir.starts_with("./data"));
    }
}
