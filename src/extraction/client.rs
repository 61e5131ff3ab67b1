//! Structured extraction client: one model call plus JSON recovery.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::extraction::prompts::build_extraction_prompt;
use crate::extraction::recovery::{JsonObject, recover_json_object};
use crate::extraction::shapes::{ExtractionResult, ExtractionTarget, ProposalDraft, RequestDraft};
use crate::llm::provider::{CompletionRequest, LlmProvider};

/// Temperature for extraction calls.
const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// Sends extraction prompts to the model and recovers structured objects.
pub struct StructuredExtractionClient {
    llm: Arc<dyn LlmProvider>,
}

impl StructuredExtractionClient {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Extract `target` from `raw_text`.
    pub async fn extract_structured(
        &self,
        raw_text: &str,
        target: ExtractionTarget,
    ) -> Result<ExtractionResult, ExtractionError> {
        info!(
            target = target.label(),
            chars = raw_text.len(),
            model = self.llm.model_name(),
            "Running structured extraction"
        );

        let prompt = build_extraction_prompt(target, raw_text);
        let obj = self.complete_json(prompt).await?;

        Ok(match target {
            ExtractionTarget::Request => ExtractionResult::Request(RequestDraft::from_object(&obj)),
            ExtractionTarget::Proposal => {
                ExtractionResult::Proposal(ProposalDraft::from_object(&obj))
            }
        })
    }

    /// Extract a proposal draft.
    pub async fn extract_proposal(&self, raw_text: &str) -> Result<ProposalDraft, ExtractionError> {
        self.extract_structured(raw_text, ExtractionTarget::Proposal)
            .await?
            .into_proposal()
            .ok_or_else(|| shape_mismatch(ExtractionTarget::Proposal))
    }

    /// Extract a request draft.
    pub async fn extract_request(&self, raw_text: &str) -> Result<RequestDraft, ExtractionError> {
        self.extract_structured(raw_text, ExtractionTarget::Request)
            .await?
            .into_request()
            .ok_or_else(|| shape_mismatch(ExtractionTarget::Request))
    }

    /// Send an arbitrary prompt and recover one JSON object from the reply.
    ///
    /// Shared with the comparison step, which builds its own prompt.
    pub async fn complete_json(&self, prompt: String) -> Result<JsonObject, ExtractionError> {
        let request = CompletionRequest::new(prompt).with_temperature(EXTRACTION_TEMPERATURE);
        let response = self.llm.complete(request).await?;

        debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Model call complete"
        );

        recover_json_object(&response.content).inspect_err(|e| {
            warn!(raw_response = %response.content, error = %e, "Unrecoverable model output");
        })
    }
}

fn shape_mismatch(expected: ExtractionTarget) -> ExtractionError {
    ExtractionError::Parse {
        payload: String::new(),
        reason: format!("extraction did not produce a {} shape", expected.label()),
    }
}
