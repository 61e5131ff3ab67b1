//! Outbound request messages.
//!
//! The rendered subject and body both carry the request id, which is what
//! lets a free-form reply be correlated back to its request.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::DispatchError;
use crate::model::{Counterparty, Request};
use crate::store::ProcurementStore;

/// A rendered message ready for a notifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivers rendered messages. Transport mechanics live behind this trait.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DispatchError>;
}

/// Notifier that only logs what would be sent.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
        info!(to = %message.to, subject = %message.subject, bytes = message.html.len(), "Outbound message");
        Ok(())
    }
}

/// Subject line carrying the request id.
pub fn request_subject(request: &Request) -> String {
    format!("RFP: {} (RFP ID: {})", request.title, request.id)
}

/// Render the outbound message for one counterparty.
pub fn render_request_message(request: &Request, counterparty: &Counterparty) -> OutboundMessage {
    render_with(request, counterparty, None, None)
}

fn render_with(
    request: &Request,
    counterparty: &Counterparty,
    subject: Option<&str>,
    preface: Option<&str>,
) -> OutboundMessage {
    let subject = match subject.map(str::trim).filter(|s| !s.is_empty()) {
        Some(custom) if custom.contains(&request.id) => custom.to_string(),
        Some(custom) => format!("{custom} (RFP ID: {})", request.id),
        None => request_subject(request),
    };

    let mut html = String::new();
    if let Some(preface) = preface.map(str::trim).filter(|s| !s.is_empty()) {
        let _ = write!(html, "<p>{}</p>", escape_html(preface));
    }
    html.push_str(&request_html(request));

    let contact = counterparty
        .contact_person
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(&counterparty.name);
    let _ = write!(
        html,
        "<p>Vendor Contact: {} - {}</p>",
        escape_html(contact),
        escape_html(counterparty.phone.as_deref().unwrap_or_default())
    );

    OutboundMessage {
        to: counterparty.email.clone(),
        subject,
        html,
    }
}

fn or_na(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| escape_html(&v))
        .unwrap_or_else(|| "N/A".to_string())
}

fn request_html(request: &Request) -> String {
    const CELL: &str = "padding:6px;border:1px solid #ddd";

    let mut rows = String::new();
    for item in &request.line_items {
        let _ = write!(
            rows,
            "<tr><td style=\"{CELL}\">{}</td><td style=\"{CELL}\">{}</td><td style=\"{CELL}\">{}</td></tr>",
            escape_html(&item.name),
            item.quantity.normalize(),
            escape_html(&item.specs)
        );
    }
    if rows.is_empty() {
        let _ = write!(rows, "<tr><td colspan=\"3\" style=\"{CELL}\">None</td></tr>");
    }

    let budget = request
        .budget
        .map(|b| format!("{} {}", b.normalize(), escape_html(&request.currency)));

    format!(
        "<div style=\"font-family:Arial,Helvetica,sans-serif;color:#111\">\
         <h2>RFP: {title}</h2>\
         <p>{description}</p>\
         <p><strong>Budget:</strong> {budget}</p>\
         <p><strong>Delivery (days):</strong> {delivery}</p>\
         <p><strong>Payment terms:</strong> {payment}</p>\
         <p><strong>Warranty:</strong> {warranty}</p>\
         <h4>Line Items</h4>\
         <table style=\"border-collapse:collapse\"><thead><tr>\
         <th style=\"{CELL};text-align:left\">Item</th>\
         <th style=\"{CELL};text-align:left\">Qty</th>\
         <th style=\"{CELL};text-align:left\">Specs</th>\
         </tr></thead><tbody>{rows}</tbody></table>\
         <p style=\"margin-top:16px\">Please reply with your proposal or attach your quote.</p>\
         <p>RFP ID: {id}</p>\
         </div>",
        title = escape_html(&request.title),
        description = escape_html(&request.description),
        budget = or_na(budget),
        delivery = or_na(request.delivery_days.map(|d| d.to_string())),
        payment = or_na(Some(request.payment_terms.clone())),
        warranty = or_na(Some(request.warranty.clone())),
        id = request.id,
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

// ── Dispatch ────────────────────────────────────────────────────────

/// Who to send to and optional overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOptions {
    /// Recipients; falls back to the request's existing `sent_to` when empty.
    #[serde(default, alias = "vendorIds")]
    pub counterparty_ids: Vec<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSent {
    pub counterparty_id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchFailure {
    pub counterparty_id: String,
    pub error: String,
}

/// Per-recipient outcome of a dispatch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub sent: Vec<DispatchSent>,
    pub errors: Vec<DispatchFailure>,
}

/// Send a request to each recipient. A failing recipient is recorded and
/// the rest are still attempted; each success marks the request sent.
pub async fn dispatch_request(
    store: &Arc<dyn ProcurementStore>,
    notifier: &dyn Notifier,
    request_id: &str,
    options: &DispatchOptions,
) -> Result<DispatchReport, DispatchError> {
    let request = store
        .find_request_by_id(request_id)
        .await?
        .ok_or_else(|| DispatchError::UnknownRequest {
            id: request_id.to_string(),
        })?;

    let recipient_ids = if !options.counterparty_ids.is_empty() {
        &options.counterparty_ids
    } else if !request.sent_to.is_empty() {
        &request.sent_to
    } else {
        return Err(DispatchError::NoRecipients(
            "no counterparty ids given and the request has no previous recipients".into(),
        ));
    };

    let mut counterparties = Vec::new();
    for id in recipient_ids {
        if let Some(c) = store.find_counterparty_by_id(id).await? {
            counterparties.push(c);
        }
    }
    if counterparties.is_empty() {
        return Err(DispatchError::NoRecipients(
            "no counterparty records found for the given ids".into(),
        ));
    }

    let mut report = DispatchReport::default();
    for counterparty in &counterparties {
        if counterparty.email.trim().is_empty() {
            report.errors.push(DispatchFailure {
                counterparty_id: counterparty.id.clone(),
                error: "counterparty has no email".into(),
            });
            continue;
        }

        let message = render_with(
            &request,
            counterparty,
            options.subject.as_deref(),
            options.message.as_deref(),
        );

        let outcome = match notifier.send(&message).await {
            Ok(()) => store
                .mark_request_sent(&request.id, &counterparty.id)
                .await
                .map_err(DispatchError::from),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => report.sent.push(DispatchSent {
                counterparty_id: counterparty.id.clone(),
                email: counterparty.email.clone(),
            }),
            Err(e) => {
                warn!(request_id = %request.id, counterparty = %counterparty.id, error = %e, "Dispatch failed");
                report.errors.push(DispatchFailure {
                    counterparty_id: counterparty.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        request_id = %request.id,
        sent = report.sent.len(),
        failed = report.errors.len(),
        "Dispatch complete"
    );
    Ok(report)
}
