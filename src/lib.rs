//! RFP intake: inbound proposal ingestion and AI-assisted extraction.

pub mod attachments;
pub mod config;
pub mod error;
pub mod extraction;
pub mod inbound;
pub mod llm;
pub mod model;
pub mod outbound;
pub mod pipeline;
pub mod server;
pub mod store;
