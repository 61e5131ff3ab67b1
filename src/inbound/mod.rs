//! Inbound replies: webhook payload and correlation.

pub mod correlation;
pub mod types;

pub use correlation::{Correlation, CorrelationSource, InboundCorrelationResolver};
pub use types::InboundMessage;
