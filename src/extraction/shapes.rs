//! Target shapes and permissive normalization of recovered objects.
//!
//! The model's JSON is never validated against a schema. Each known field is
//! looked up under its accepted aliases and coerced; unknown keys are
//! dropped. Missing optional numbers become `None`, missing counts and totals
//! become zero, missing strings become empty.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extraction::recovery::JsonObject;
use crate::model::{LineItem, NewRequest, ProposalItem};

/// Default currency applied when a request draft names none.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Characters of source text used when a request has no description.
const DESCRIPTION_FALLBACK_CHARS: usize = 400;

/// Which object the model is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionTarget {
    Request,
    Proposal,
}

impl ExtractionTarget {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Proposal => "proposal",
        }
    }
}

/// Output of a structured extraction call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum ExtractionResult {
    Request(RequestDraft),
    Proposal(ProposalDraft),
}

impl ExtractionResult {
    pub fn target(&self) -> ExtractionTarget {
        match self {
            Self::Request(_) => ExtractionTarget::Request,
            Self::Proposal(_) => ExtractionTarget::Proposal,
        }
    }

    pub fn into_request(self) -> Option<RequestDraft> {
        match self {
            Self::Request(draft) => Some(draft),
            Self::Proposal(_) => None,
        }
    }

    pub fn into_proposal(self) -> Option<ProposalDraft> {
        match self {
            Self::Proposal(draft) => Some(draft),
            Self::Request(_) => None,
        }
    }
}

// ── Request shape ───────────────────────────────────────────────────

/// A request as recovered from free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDraft {
    pub title: String,
    pub description: String,
    pub budget: Option<Decimal>,
    pub currency: String,
    pub delivery_days: Option<u32>,
    pub payment_terms: String,
    pub warranty: String,
    pub line_items: Vec<LineItem>,
}

impl RequestDraft {
    pub fn from_object(obj: &JsonObject) -> Self {
        let line_items = array_field(obj, &["lineItems", "line_items", "items"])
            .iter()
            .filter_map(Value::as_object)
            .map(|item| LineItem {
                name: string_field(item, &["name", "item"]),
                quantity: count_field(item, &["qty", "quantity"]),
                specs: string_field(item, &["specs", "spec", "notes"]),
            })
            .collect();

        Self {
            title: string_field(obj, &["title"]),
            description: string_field(obj, &["description"]),
            budget: decimal_field(obj, &["budget"]),
            currency: string_field(obj, &["currency"]),
            delivery_days: days_field(obj, &["deliveryDays", "delivery_days"]),
            payment_terms: string_field(obj, &["paymentTerms", "payment_terms"]),
            warranty: string_field(obj, &["warranty"]),
            line_items,
        }
    }

    /// Turn the draft into a creatable request, filling gaps from `source_text`.
    pub fn into_new_request(self, source_text: &str) -> NewRequest {
        let title = if !self.title.trim().is_empty() {
            self.title
        } else if let Some(first) = self.line_items.first().filter(|li| !li.name.is_empty()) {
            format!("{} procurement", first.name)
        } else {
            "Parsed RFP".to_string()
        };

        let description = if self.description.trim().is_empty() {
            source_text.chars().take(DESCRIPTION_FALLBACK_CHARS).collect()
        } else {
            self.description
        };

        let currency = if self.currency.trim().is_empty() {
            DEFAULT_CURRENCY.to_string()
        } else {
            self.currency
        };

        NewRequest {
            title,
            description,
            budget: self.budget,
            currency,
            delivery_days: self.delivery_days,
            payment_terms: self.payment_terms,
            warranty: self.warranty,
            line_items: self.line_items,
        }
    }
}

// ── Proposal shape ──────────────────────────────────────────────────

/// A proposal as recovered from free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalDraft {
    pub items: Vec<ProposalItem>,
    pub total_price: Option<Decimal>,
    pub currency: String,
    pub payment_terms: String,
    pub warranty: String,
    pub delivery_days: Option<u32>,
}

impl ProposalDraft {
    pub fn from_object(obj: &JsonObject) -> Self {
        let items = array_field(obj, &["items", "lineItems", "line_items"])
            .iter()
            .filter_map(Value::as_object)
            .map(|item| ProposalItem {
                name: string_field(item, &["name", "item"]),
                quantity: count_field(item, &["qty", "quantity"]),
                unit_price: decimal_field(item, &["unitPrice", "unit_price", "price"]),
                total: count_field(item, &["total", "lineTotal", "line_total"]),
                notes: string_field(item, &["notes", "specs", "spec"]),
            })
            .collect();

        Self {
            items,
            total_price: decimal_field(obj, &["totalPrice", "total_price", "total", "amount"]),
            currency: string_field(obj, &["currency"]),
            payment_terms: string_field(obj, &["paymentTerms", "payment_terms"]),
            warranty: string_field(obj, &["warranty"]),
            delivery_days: days_field(obj, &["deliveryDays", "delivery_days"]),
        }
    }
}

// ── Field coercion ──────────────────────────────────────────────────

/// First present, non-null value among `keys`.
pub(crate) fn lookup<'a>(obj: &'a JsonObject, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

pub(crate) fn string_field(obj: &JsonObject, keys: &[&str]) -> String {
    match lookup(obj, keys) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn decimal_field(obj: &JsonObject, keys: &[&str]) -> Option<Decimal> {
    lookup(obj, keys).and_then(coerce_decimal)
}

/// Counts and totals default to zero rather than `None`.
pub(crate) fn count_field(obj: &JsonObject, keys: &[&str]) -> Decimal {
    decimal_field(obj, keys).unwrap_or(Decimal::ZERO)
}

pub(crate) fn days_field(obj: &JsonObject, keys: &[&str]) -> Option<u32> {
    decimal_field(obj, keys).and_then(|d| d.round().to_u32())
}

pub(crate) fn array_field<'a>(obj: &'a JsonObject, keys: &[&str]) -> &'a [Value] {
    match lookup(obj, keys) {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

/// Coerce a JSON number or a loosely formatted string (`"$1,200.50"`) to a decimal.
pub(crate) fn coerce_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
                .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain))
        }
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Decimal::from_str(&cleaned).ok()
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    fn obj(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn proposal_full_object() {
        let draft = ProposalDraft::from_object(&obj(json!({
            "items": [
                { "name": "Laptop", "qty": 20, "unitPrice": 1000, "total": 20000 },
                { "name": "Monitor", "qty": 15, "unitPrice": 300, "total": 4500, "notes": "27 inch" }
            ],
            "totalPrice": 24500,
            "currency": "USD",
            "paymentTerms": "Net 30",
            "warranty": "1 year",
            "deliveryDays": 14
        })));

        assert_eq!(draft.items.len(), 2);
        assert_eq!(draft.items[0].quantity, dec!(20));
        assert_eq!(draft.items[1].unit_price, Some(dec!(300)));
        assert_eq!(draft.items[1].notes, "27 inch");
        assert_eq!(draft.total_price, Some(dec!(24500)));
        assert_eq!(draft.delivery_days, Some(14));
        assert_eq!(draft.payment_terms, "Net 30");
    }

    #[test]
    fn proposal_missing_fields_normalize() {
        let draft = ProposalDraft::from_object(&obj(json!({
            "items": [{ "name": "Chair" }],
            "totalPrice": null
        })));

        assert_eq!(draft.total_price, None);
        assert_eq!(draft.delivery_days, None);
        assert_eq!(draft.currency, "");
        assert_eq!(draft.warranty, "");
        assert_eq!(draft.items[0].quantity, Decimal::ZERO);
        assert_eq!(draft.items[0].total, Decimal::ZERO);
        assert_eq!(draft.items[0].unit_price, None);
    }

    #[test]
    fn proposal_aliases_are_accepted() {
        let draft = ProposalDraft::from_object(&obj(json!({
            "lineItems": [{ "item": "Desk", "quantity": "3", "unit_price": "$150.00", "specs": "oak" }],
            "amount": "1,200.50",
            "payment_terms": "50% upfront"
        })));

        assert_eq!(draft.items[0].name, "Desk");
        assert_eq!(draft.items[0].quantity, dec!(3));
        assert_eq!(draft.items[0].unit_price, Some(dec!(150.00)));
        assert_eq!(draft.items[0].notes, "oak");
        assert_eq!(draft.total_price, Some(dec!(1200.50)));
        assert_eq!(draft.payment_terms, "50% upfront");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let draft = ProposalDraft::from_object(&obj(json!({
            "totalPrice": 500,
            "confidence": 0.9,
            "vendorMood": "cheerful"
        })));
        assert_eq!(draft.total_price, Some(dec!(500)));
        assert!(draft.items.is_empty());
    }

    #[test]
    fn non_object_items_are_skipped() {
        let draft = ProposalDraft::from_object(&obj(json!({
            "items": ["just a string", { "name": "Real item", "total": 10 }]
        })));
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].total, dec!(10));
    }

    #[test]
    fn delivery_days_from_text() {
        let draft = ProposalDraft::from_object(&obj(json!({ "deliveryDays": "10 days" })));
        assert_eq!(draft.delivery_days, Some(10));
    }

    #[test]
    fn negative_days_become_none() {
        let draft = ProposalDraft::from_object(&obj(json!({ "deliveryDays": -4 })));
        assert_eq!(draft.delivery_days, None);
    }

    #[test]
    fn coerce_decimal_variants() {
        assert_eq!(coerce_decimal(&json!(12.5)), Some(dec!(12.5)));
        assert_eq!(coerce_decimal(&json!("€ 99")), Some(dec!(99)));
        assert_eq!(coerce_decimal(&json!("n/a")), None);
        assert_eq!(coerce_decimal(&json!(true)), None);
    }

    #[test]
    fn request_draft_from_object() {
        let draft = RequestDraft::from_object(&obj(json!({
            "title": "Office laptops",
            "description": "Need laptops for new hires",
            "budget": 50000,
            "currency": "USD",
            "deliveryDays": 30,
            "paymentTerms": "Net 30",
            "warranty": "1 year",
            "lineItems": [{ "name": "Laptop", "qty": 20, "specs": "16GB RAM" }]
        })));

        assert_eq!(draft.title, "Office laptops");
        assert_eq!(draft.budget, Some(dec!(50000)));
        assert_eq!(draft.line_items[0].specs, "16GB RAM");
        assert_eq!(draft.line_items[0].quantity, dec!(20));
    }

    #[test]
    fn request_defaults_from_first_item_and_source() {
        let draft = RequestDraft::from_object(&obj(json!({
            "lineItems": [{ "name": "Printer", "qty": 2 }]
        })));
        let source = "We need two printers for the second floor.";
        let request = draft.into_new_request(source);

        assert_eq!(request.title, "Printer procurement");
        assert_eq!(request.description, source);
        assert_eq!(request.currency, DEFAULT_CURRENCY);
        assert_eq!(request.budget, None);
    }

    #[test]
    fn request_defaults_without_items() {
        let request = RequestDraft::default().into_new_request(&"x".repeat(1000));
        assert_eq!(request.title, "Parsed RFP");
        assert_eq!(request.description.chars().count(), 400);
    }
}
