//! `ProcurementStore` trait: the persistence collaborator.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::model::{
    Counterparty, ExtractedProposal, NewCounterparty, NewProposal, NewRequest, Request,
};

/// Backend-agnostic storage for requests, counterparties and proposals.
#[async_trait]
pub trait ProcurementStore: Send + Sync {
    // ── Counterparties ──────────────────────────────────────────────

    /// Look up a counterparty by email, case-insensitively.
    async fn find_counterparty_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Counterparty>, DatabaseError>;

    async fn find_counterparty_by_id(&self, id: &str)
    -> Result<Option<Counterparty>, DatabaseError>;

    /// Register a counterparty. The email is stored lower-cased.
    async fn create_counterparty(
        &self,
        new: &NewCounterparty,
    ) -> Result<Counterparty, DatabaseError>;

    // ── Requests ────────────────────────────────────────────────────

    async fn find_request_by_id(&self, id: &str) -> Result<Option<Request>, DatabaseError>;

    /// Create a request in `draft` status.
    async fn create_request(&self, new: &NewRequest) -> Result<Request, DatabaseError>;

    /// Add `counterparty_id` to the request's recipients and set it `sent`.
    async fn mark_request_sent(
        &self,
        request_id: &str,
        counterparty_id: &str,
    ) -> Result<(), DatabaseError>;

    // ── Proposals ───────────────────────────────────────────────────

    /// Append a proposal. Never updates an existing one.
    async fn create_proposal(&self, new: &NewProposal)
    -> Result<ExtractedProposal, DatabaseError>;

    /// All proposals for a request, oldest first.
    async fn find_proposals_by_request(
        &self,
        request_id: &str,
    ) -> Result<Vec<ExtractedProposal>, DatabaseError>;
}
