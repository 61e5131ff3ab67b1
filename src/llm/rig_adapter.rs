//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.

use std::time::Duration;

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use tracing::{debug, error};

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// A rig completion model behind `LlmProvider`.
///
/// Without a model (no API key configured) every call fails with
/// `LlmError::MissingApiKey`.
pub struct RigAdapter<M> {
    model: Option<M>,
    provider: &'static str,
    model_name: String,
    timeout: Duration,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: Option<M>, provider: &'static str, model_name: &str, timeout: Duration) -> Self {
        Self {
            model,
            provider,
            model_name: model_name.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let model = self.model.as_ref().ok_or_else(|| LlmError::MissingApiKey {
            provider: self.provider.to_string(),
        })?;

        debug!(
            provider = self.provider,
            model = %self.model_name,
            prompt_chars = request.prompt.len(),
            "Calling model"
        );

        let mut builder = model.completion_request(request.prompt);
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = tokio::time::timeout(self.timeout, builder.send())
            .await
            .map_err(|_| {
                error!(provider = self.provider, timeout = ?self.timeout, "Model call timed out");
                LlmError::Timeout {
                    provider: self.provider.to_string(),
                    timeout: self.timeout,
                }
            })?
            .map_err(|e| {
                error!(provider = self.provider, error = %e, "Model call failed");
                LlmError::RequestFailed {
                    provider: self.provider.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let content = response
            .choice
            .iter()
            .filter_map(|part| match part {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: self.provider.to_string(),
            });
        }

        Ok(CompletionResponse {
            content,
            input_tokens: u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX),
            output_tokens: u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX),
        })
    }
}
