//! LLM integration for RFP intake.
//!
//! Gemini is reached through rig-core; `RigAdapter` bridges rig's
//! `CompletionModel` to our `LlmProvider` trait so callers and tests depend
//! only on the trait.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use rig::providers::gemini;
use secrecy::ExposeSecret;

use crate::config::LlmConfig;
use crate::error::LlmError;

const PROVIDER: &str = "gemini";

/// Create an LLM provider from configuration.
///
/// A missing API key does not fail here; the provider reports it on the
/// first call so the rest of the service can still start.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let api_key = config
        .api_key
        .as_ref()
        .map(|k| k.expose_secret())
        .unwrap_or_default();

    let client: rig::client::Client<gemini::client::GeminiExt> = gemini::Client::new(api_key)
        .map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: format!("Failed to create Gemini client: {}", e),
        })?;

    let model = match config.api_key {
        Some(_) => Some(client.completion_model(&config.model)),
        None => {
            tracing::warn!("GEMINI_API_KEY not set; extraction calls will fail until configured");
            None
        }
    };

    tracing::info!("Using Gemini (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(
        model,
        PROVIDER,
        &config.model,
        config.timeout,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_provider_without_key_still_constructs() {
        let config = LlmConfig::default();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), crate::config::DEFAULT_MODEL);
    }

    #[test]
    fn create_provider_with_custom_model() {
        let config = LlmConfig {
            api_key: Some(secrecy::SecretString::from("test-key")),
            model: "gemini-1.5-pro".to_string(),
            ..LlmConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gemini-1.5-pro");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let provider = create_provider(&LlmConfig::default()).unwrap();
        let err = provider
            .complete(CompletionRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, LlmError::MissingApiKey { .. }));
    }
}
