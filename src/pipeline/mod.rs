//! Proposal pipeline.
//!
//! Inbound replies flow through:
//! 1. `InboundCorrelationResolver`: who sent it, which request it answers
//! 2. `AttachmentTextExtractor`: attachment bytes to text
//! 3. `StructuredExtractionClient`: combined text to a proposal draft
//! 4. `ProcurementStore::create_proposal`: append-only persistence
//!
//! Stored proposals for a request are ranked on demand by `ComparisonAggregator`.

pub mod compare;
pub mod ingest;

pub use compare::{ComparisonAggregator, ComparisonReport};
pub use ingest::ProposalIngestionOrchestrator;
