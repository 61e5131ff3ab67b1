//! Correlation of an inbound reply to its request and counterparty.
//!
//! The sender header identifies the counterparty. The request id is the
//! 24-hex token embedded in the outbound subject, searched for in the
//! explicit id field, then the subject, then the body.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::error::InboundError;
use crate::inbound::types::InboundMessage;
use crate::model::Counterparty;
use crate::store::ProcurementStore;

static REQUEST_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9a-fA-F]{24}\b").expect("static pattern"));
static BRACKETED_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("static pattern"));

/// Where the request id was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationSource {
    ExplicitField,
    Subject,
    Body,
}

/// Who sent a reply and which request it answers.
#[derive(Debug, Clone)]
pub struct Correlation {
    pub request_id: String,
    pub counterparty: Counterparty,
    pub source: CorrelationSource,
}

/// Resolves inbound messages against known counterparties.
pub struct InboundCorrelationResolver {
    store: Arc<dyn ProcurementStore>,
}

impl InboundCorrelationResolver {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, message: &InboundMessage) -> Result<Correlation, InboundError> {
        let header = message
            .sender()
            .ok_or_else(|| InboundError::InvalidMessage("missing sender".into()))?;
        let email = sender_address(header);

        let counterparty = self
            .store
            .find_counterparty_by_email(&email)
            .await?
            .ok_or_else(|| {
                warn!(sender = %email, "Reply from unknown sender rejected");
                InboundError::UnknownCounterparty {
                    email: email.clone(),
                }
            })?;

        let (request_id, source) = find_request_id(message).ok_or_else(|| {
            warn!(sender = %email, subject = %message.subject(), "Reply carries no request id");
            InboundError::MissingCorrelation
        })?;

        debug!(
            request_id = %request_id,
            counterparty = %counterparty.id,
            source = ?source,
            "Correlated inbound reply"
        );

        Ok(Correlation {
            request_id,
            counterparty,
            source,
        })
    }
}

/// Mailbox address from a sender header, lower-cased.
///
/// `Display Name <addr@host>` yields the bracketed part; anything else is
/// taken whole.
pub fn sender_address(header: &str) -> String {
    BRACKETED_ADDRESS
        .captures(header)
        .and_then(|c| c.get(1))
        .map_or(header, |m| m.as_str())
        .trim()
        .to_lowercase()
}

/// First 24-hex token in `text`, lower-cased.
pub fn find_request_token(text: &str) -> Option<String> {
    REQUEST_TOKEN.find(text).map(|m| m.as_str().to_lowercase())
}

/// Search explicit field, subject, then body.
pub fn find_request_id(message: &InboundMessage) -> Option<(String, CorrelationSource)> {
    let candidates = [
        (message.explicit_request_id(), CorrelationSource::ExplicitField),
        (Some(message.subject()), CorrelationSource::Subject),
        (message.body_text(), CorrelationSource::Body),
    ];

    candidates.into_iter().find_map(|(text, source)| {
        text.and_then(find_request_token).map(|id| (id, source))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewCounterparty;
    use crate::store::LibSqlBackend;

    fn message(from: &str, subject: &str, body: &str) -> InboundMessage {
        InboundMessage {
            from: Some(from.into()),
            subject: Some(subject.into()),
            body_plain: Some(body.into()),
            ..Default::default()
        }
    }

    async fn resolver_with_vendor(email: &str) -> (InboundCorrelationResolver, Counterparty) {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let vendor = store
            .create_counterparty(&NewCounterparty {
                name: "Vendor Co".into(),
                email: email.into(),
                ..Default::default()
            })
            .await
            .unwrap();
        (InboundCorrelationResolver::new(store), vendor)
    }

    #[test]
    fn bracketed_sender_is_extracted() {
        assert_eq!(sender_address("Jane Doe <jane@vendor.com>"), "jane@vendor.com");
        assert_eq!(sender_address("jane@vendor.com"), "jane@vendor.com");
        assert_eq!(sender_address("  JANE@Vendor.COM "), "jane@vendor.com");
    }

    #[test]
    fn subject_token_found() {
        let msg = message("x@y.z", "Re: Quote (RFP ID: 507f1f77bcf86cd799439011)", "thanks");
        assert_eq!(
            find_request_id(&msg),
            Some(("507f1f77bcf86cd799439011".to_string(), CorrelationSource::Subject))
        );
    }

    #[test]
    fn explicit_field_wins() {
        let mut msg = message("x@y.z", "RFP ID: 507f1f77bcf86cd799439011", "");
        msg.request_id = Some("AAAAAAAAAAAAAAAAAAAAAAAA".into());
        assert_eq!(
            find_request_id(&msg),
            Some(("aaaaaaaaaaaaaaaaaaaaaaaa".to_string(), CorrelationSource::ExplicitField))
        );
    }

    #[test]
    fn body_is_last_resort() {
        let msg = message(
            "x@y.z",
            "Re: your request",
            "Quoted:\n> RFP ID: 65a1b2c3d4e5f60718293a4b\nOur price is $500",
        );
        assert_eq!(
            find_request_id(&msg),
            Some(("65a1b2c3d4e5f60718293a4b".to_string(), CorrelationSource::Body))
        );
    }

    #[test]
    fn longer_hex_runs_do_not_match() {
        assert!(find_request_token("id 507f1f77bcf86cd799439011ff").is_none());
        assert!(find_request_token("no ids here").is_none());
    }

    #[tokio::test]
    async fn resolves_known_sender() {
        let (resolver, vendor) = resolver_with_vendor("jane@vendor.com").await;
        let msg = message(
            "Jane Doe <Jane@Vendor.com>",
            "Re: Quote (RFP ID: 507f1f77bcf86cd799439011)",
            "We quote $500",
        );

        let correlation = resolver.resolve(&msg).await.unwrap();
        assert_eq!(correlation.request_id, "507f1f77bcf86cd799439011");
        assert_eq!(correlation.counterparty.id, vendor.id);
    }

    #[tokio::test]
    async fn unknown_sender_rejected() {
        let (resolver, _) = resolver_with_vendor("jane@vendor.com").await;
        let msg = message("bob@elsewhere.com", "RFP ID: 507f1f77bcf86cd799439011", "hi");

        let err = resolver.resolve(&msg).await.unwrap_err();
        assert!(
            matches!(err, InboundError::UnknownCounterparty { ref email } if email == "bob@elsewhere.com")
        );
    }

    #[tokio::test]
    async fn uncorrelated_reply_rejected() {
        let (resolver, _) = resolver_with_vendor("jane@vendor.com").await;
        let msg = message("jane@vendor.com", "Re: quote", "Price is $500");

        let err = resolver.resolve(&msg).await.unwrap_err();
        assert!(matches!(err, InboundError::MissingCorrelation));
    }
}
