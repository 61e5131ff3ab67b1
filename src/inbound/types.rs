//! Inbound webhook payload.

use std::collections::HashMap;

use serde::Deserialize;

/// An inbound reply as delivered by the mail webhook.
///
/// Providers disagree on field names, so several spellings are accepted for
/// the sender and the body text. Accessors pick the first populated one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, rename = "body-plain")]
    pub body_plain: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, rename = "stripped-text")]
    pub stripped_text: Option<String>,
    /// Request id supplied directly by the transport, if any.
    #[serde(default, rename = "rfpId", alias = "rfp_id")]
    pub request_id: Option<String>,
}

fn populated(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl InboundMessage {
    /// Build from flat form fields (multipart or urlencoded webhooks).
    pub fn from_form_fields(fields: &HashMap<String, String>) -> Self {
        let get = |key: &str| fields.get(key).cloned();
        Self {
            sender: get("sender"),
            from: get("from"),
            subject: get("subject"),
            body_plain: get("body-plain"),
            text: get("text"),
            body: get("body"),
            stripped_text: get("stripped-text"),
            request_id: get("rfpId").or_else(|| get("rfp_id")),
        }
    }

    /// Raw sender header: `sender`, then `from`.
    pub fn sender(&self) -> Option<&str> {
        populated(&self.sender).or_else(|| populated(&self.from))
    }

    /// Body text from whichever field is populated.
    pub fn body_text(&self) -> Option<&str> {
        populated(&self.body_plain)
            .or_else(|| populated(&self.text))
            .or_else(|| populated(&self.body))
            .or_else(|| populated(&self.stripped_text))
    }

    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or_default()
    }

    pub fn explicit_request_id(&self) -> Option<&str> {
        populated(&self.request_id)
    }
}
