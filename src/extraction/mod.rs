//! Structured extraction: free text in, typed request/proposal drafts out.
//!
//! Flow:
//! 1. Build a prompt embedding the source text and the target JSON shape
//! 2. One model call through `LlmProvider`
//! 3. Two-tier JSON recovery (`recovery`)
//! 4. Permissive normalization into a draft (`shapes`)

pub mod client;
pub mod prompts;
pub mod recovery;
pub mod shapes;

pub use client::StructuredExtractionClient;
pub use recovery::{JsonObject, recover_json_object};
pub use shapes::{ExtractionResult, ExtractionTarget, ProposalDraft, RequestDraft};
