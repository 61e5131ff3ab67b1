//! Proposal ingestion: inbound reply in, stored proposal out.
//!
//! Flow:
//! 1. Validate sender and body
//! 2. Correlate to a counterparty and request (rejects on failure)
//! 3. Extract attachment text, appended under a per-file separator
//! 4. Structured extraction on the combined text
//! 5. Persist a new proposal with `parsed = true`

use std::sync::Arc;

use tracing::{info, warn};

use crate::attachments::{AttachmentTextExtractor, InboundAttachment};
use crate::error::{InboundError, IngestionError};
use crate::extraction::{ProposalDraft, StructuredExtractionClient};
use crate::inbound::{InboundCorrelationResolver, InboundMessage};
use crate::model::{Attachment, ExtractedProposal, NewProposal};
use crate::store::ProcurementStore;

/// Turns inbound replies into stored proposals.
pub struct ProposalIngestionOrchestrator {
    store: Arc<dyn ProcurementStore>,
    resolver: InboundCorrelationResolver,
    attachments: AttachmentTextExtractor,
    extraction: Arc<StructuredExtractionClient>,
}

impl ProposalIngestionOrchestrator {
    pub fn new(
        store: Arc<dyn ProcurementStore>,
        extraction: Arc<StructuredExtractionClient>,
        attachments: AttachmentTextExtractor,
    ) -> Self {
        Self {
            resolver: InboundCorrelationResolver::new(Arc::clone(&store)),
            store,
            attachments,
            extraction,
        }
    }

    /// Ingest one webhook reply and its attachments.
    pub async fn ingest(
        &self,
        message: &InboundMessage,
        attachments: &[InboundAttachment],
    ) -> Result<ExtractedProposal, IngestionError> {
        if message.sender().is_none() {
            return Err(InboundError::InvalidMessage("missing sender".into()).into());
        }
        let body = message
            .body_text()
            .ok_or_else(|| InboundError::InvalidMessage("empty body".into()))?;

        let correlation = self.resolver.resolve(message).await?;
        self.require_request(&correlation.request_id).await?;

        info!(
            request_id = %correlation.request_id,
            counterparty = %correlation.counterparty.id,
            attachments = attachments.len(),
            "Ingesting inbound proposal"
        );

        let stored = self.attachments.extract_all(attachments).await;
        let combined = combine_text(body, &stored);
        let draft = self.extraction.extract_proposal(&combined).await?;

        self.persist(
            &correlation.request_id,
            &correlation.counterparty.id,
            body,
            draft,
            stored,
        )
        .await
    }

    /// Ingest pasted proposal text for a known request and counterparty.
    pub async fn ingest_text(
        &self,
        request_id: &str,
        counterparty_id: &str,
        text: &str,
    ) -> Result<ExtractedProposal, IngestionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InboundError::InvalidMessage("empty proposal text".into()).into());
        }

        self.require_request(request_id).await?;
        let counterparty = self
            .store
            .find_counterparty_by_id(counterparty_id)
            .await?
            .ok_or_else(|| InboundError::UnknownCounterpartyId {
                id: counterparty_id.to_string(),
            })?;

        info!(request_id = %request_id, counterparty = %counterparty.id, "Ingesting pasted proposal");

        let draft = self.extraction.extract_proposal(text).await?;
        self.persist(request_id, &counterparty.id, text, draft, Vec::new())
            .await
    }

    async fn require_request(&self, request_id: &str) -> Result<(), IngestionError> {
        if self.store.find_request_by_id(request_id).await?.is_none() {
            warn!(request_id = %request_id, "Proposal references an unknown request");
            return Err(InboundError::UnknownRequest {
                id: request_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn persist(
        &self,
        request_id: &str,
        counterparty_id: &str,
        raw_text: &str,
        draft: ProposalDraft,
        attachments: Vec<Attachment>,
    ) -> Result<ExtractedProposal, IngestionError> {
        let new = NewProposal {
            request_id: request_id.to_string(),
            counterparty_id: counterparty_id.to_string(),
            raw_text: raw_text.to_string(),
            items: draft.items,
            total_price: draft.total_price,
            currency: draft.currency,
            payment_terms: draft.payment_terms,
            warranty: draft.warranty,
            delivery_days: draft.delivery_days,
            parsed: true,
            attachments,
        };

        let proposal = self.store.create_proposal(&new).await?;
        info!(
            proposal_id = %proposal.id,
            request_id = %proposal.request_id,
            total_price = ?proposal.total_price,
            "Proposal stored"
        );
        Ok(proposal)
    }
}

/// Body text followed by each non-empty attachment under a named separator.
fn combine_text(body: &str, attachments: &[Attachment]) -> String {
    let mut combined = body.to_string();
    for attachment in attachments {
        let text = attachment.extracted_text.trim();
        if text.is_empty() {
            continue;
        }
        combined.push_str("\n\n--- Attachment: ");
        combined.push_str(&attachment.filename);
        combined.push_str(" ---\n");
        combined.push_str(text);
    }
    combined
}
