//! Error types for RFP intake.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
///
/// `MissingApiKey` is a configuration problem; every other variant is an
/// upstream failure.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("No API key configured for provider {provider}")]
    MissingApiKey { provider: String },

    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Provider {provider} returned no text")]
    EmptyResponse { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl LlmError {
    /// True when the failure comes from missing configuration rather than the provider.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingApiKey { .. })
    }

    /// True for transport or provider failures.
    pub fn is_upstream(&self) -> bool {
        !self.is_configuration()
    }
}

/// Failures reading one attachment. Never escapes the attachment extractor.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unreadable PDF: {0}")]
    Pdf(String),

    #[error("Unreadable DOCX: {0}")]
    Docx(String),

    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Structured extraction errors.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Model output is not recoverable as JSON ({reason}): {payload}")]
    Parse { payload: String, reason: String },
}

/// Problems with the shape or correlation of an inbound message.
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("Invalid inbound message: {0}")]
    InvalidMessage(String),

    #[error("No counterparty registered for sender {email}")]
    UnknownCounterparty { email: String },

    #[error("Inbound message carries no request identifier")]
    MissingCorrelation,

    #[error("Request {id} not found")]
    UnknownRequest { id: String },

    #[error("Counterparty {id} not found")]
    UnknownCounterpartyId { id: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Errors from proposal ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error(transparent)]
    Inbound(#[from] InboundError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Errors from proposal comparison.
#[derive(Debug, thiserror::Error)]
pub enum ComparisonError {
    #[error("No proposals found for request {request_id}")]
    NoProposals { request_id: String },

    #[error("Request {id} not found")]
    UnknownRequest { id: String },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Errors from sending a request to counterparties.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Request {id} not found")]
    UnknownRequest { id: String },

    #[error("No recipients: {0}")]
    NoRecipients(String),

    #[error("Notifier failed: {0}")]
    SendFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
