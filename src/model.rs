//! Domain records: requests, counterparties, proposals, and comparison views.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of a record identifier in hex characters.
pub const RECORD_ID_LEN: usize = 24;

/// Generate a new 24-character lowercase hex record id.
///
/// Ids have the same shape as the tokens the correlation resolver searches
/// for, so an id embedded in an outbound subject can be found in the reply.
pub fn new_record_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..RECORD_ID_LEN].to_string()
}

// ── Request ─────────────────────────────────────────────────────────

/// Lifecycle of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Draft,
    Sent,
    Closed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Closed => "closed",
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "sent" => Ok(Self::Sent),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown request status: '{other}'")),
        }
    }
}

/// One requested item. Items are value objects keyed by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub specs: String,
}

/// A procurement request (RFP).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: String,
    pub title: String,
    pub description: String,
    pub budget: Option<Decimal>,
    pub currency: String,
    pub delivery_days: Option<u32>,
    pub payment_terms: String,
    pub warranty: String,
    pub line_items: Vec<LineItem>,
    /// Counterparty ids the request was sent to.
    pub sent_to: Vec<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    pub title: String,
    pub description: String,
    pub budget: Option<Decimal>,
    pub currency: String,
    pub delivery_days: Option<u32>,
    pub payment_terms: String,
    pub warranty: String,
    pub line_items: Vec<LineItem>,
}

// ── Counterparty ────────────────────────────────────────────────────

/// A vendor eligible to receive requests and submit proposals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counterparty {
    pub id: String,
    pub name: String,
    /// Lower-cased; the identity key for correlation.
    pub email: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to register a counterparty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCounterparty {
    pub name: String,
    pub email: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

// ── Proposal ────────────────────────────────────────────────────────

/// One priced line in a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalItem {
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub total: Decimal,
    #[serde(default)]
    pub notes: String,
}

/// Metadata for a file that arrived with a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub filename: String,
    /// Where the file is stored, if it was persisted to disk.
    pub storage_path: Option<String>,
    pub media_type: String,
    pub size: u64,
    pub extracted_text: String,
}

/// A counterparty's structured response to a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedProposal {
    pub id: String,
    pub request_id: String,
    pub counterparty_id: String,
    pub raw_text: String,
    pub items: Vec<ProposalItem>,
    /// Stored as extracted; not recomputed from items on read.
    pub total_price: Option<Decimal>,
    pub currency: String,
    pub payment_terms: String,
    pub warranty: String,
    pub delivery_days: Option<u32>,
    /// True when the record came from model extraction rather than manual entry.
    pub parsed: bool,
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
}

impl ExtractedProposal {
    /// Sum of item totals.
    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(|i| i.total).sum()
    }
}

/// Fields needed to create a proposal.
#[derive(Debug, Clone, Default)]
pub struct NewProposal {
    pub request_id: String,
    pub counterparty_id: String,
    pub raw_text: String,
    pub items: Vec<ProposalItem>,
    pub total_price: Option<Decimal>,
    pub currency: String,
    pub payment_terms: String,
    pub warranty: String,
    pub delivery_days: Option<u32>,
    pub parsed: bool,
    pub attachments: Vec<Attachment>,
}

// ── Comparison ──────────────────────────────────────────────────────

/// One row of the ranked comparison table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub counterparty: String,
    pub total_price: Option<Decimal>,
    pub delivery_days: Option<u32>,
    pub warranty: String,
    pub payment_terms: String,
    pub score: f64,
}

/// The single counterparty the comparison recommends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub counterparty: String,
    pub reason: String,
}

/// Transient comparison view across proposals for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub summary: String,
    pub rows: Vec<ComparisonRow>,
    pub recommendation: Option<Recommendation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_is_24_hex() {
        let id = new_record_id();
        assert_eq!(id.len(), RECORD_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn record_ids_differ() {
        assert_ne!(new_record_id(), new_record_id());
    }

    #[test]
    fn request_status_round_trips_through_str() {
        for status in [RequestStatus::Draft, RequestStatus::Sent, RequestStatus::Closed] {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
        assert!("archived".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn items_total_sums_lines() {
        let proposal = ExtractedProposal {
            id: new_record_id(),
            request_id: new_record_id(),
            counterparty_id: new_record_id(),
            raw_text: String::new(),
            items: vec![
                ProposalItem {
                    name: "Laptop".into(),
                    quantity: Decimal::from(2),
                    unit_price: Some(Decimal::from(100)),
                    total: Decimal::from(200),
                    notes: String::new(),
                },
                ProposalItem {
                    name: "Monitor".into(),
                    quantity: Decimal::from(1),
                    unit_price: None,
                    total: Decimal::from(50),
                    notes: String::new(),
                },
            ],
            total_price: Some(Decimal::from(250)),
            currency: "USD".into(),
            payment_terms: String::new(),
            warranty: String::new(),
            delivery_days: None,
            parsed: true,
            attachments: vec![],
            created_at: Utc::now(),
        };
        assert_eq!(proposal.items_total(), Decimal::from(250));
    }
}
