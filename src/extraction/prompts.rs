//! Prompt construction for extraction and comparison.

use crate::extraction::shapes::ExtractionTarget;
use crate::model::Request;

const REQUEST_SHAPE: &str = r#"{
  "title": string,
  "description": string,
  "budget": number or null,
  "currency": string or null,
  "deliveryDays": number or null,
  "paymentTerms": string or null,
  "warranty": string or null,
  "lineItems": [
    { "name": string, "qty": number, "specs": string }
  ]
}"#;

const PROPOSAL_SHAPE: &str = r#"{
  "items": [
    { "name": string, "qty": number, "unitPrice": number, "total": number, "notes": string }
  ],
  "totalPrice": number or null,
  "currency": string or null,
  "paymentTerms": string or null,
  "warranty": string or null,
  "deliveryDays": number or null
}"#;

const COMPARISON_SHAPE: &str = r#"{
  "summary": "short overview of differences",
  "comparisonTable": [
    {
      "vendor": string,
      "totalPrice": number,
      "deliveryDays": number,
      "warranty": string,
      "paymentTerms": string,
      "score": number
    }
  ],
  "recommendation": {
    "vendor": string,
    "reason": string
  }
}"#;

/// Build the extraction prompt for `target`, embedding `text` verbatim.
pub fn build_extraction_prompt(target: ExtractionTarget, text: &str) -> String {
    let (what, shape, source_label) = match target {
        ExtractionTarget::Request => ("RFP", REQUEST_SHAPE, "User text"),
        ExtractionTarget::Proposal => ("PROPOSAL", PROPOSAL_SHAPE, "Vendor text"),
    };

    format!(
        "Extract structured {what} details from the following text.\n\
         Return ONLY a JSON object with the following structure:\n\n\
         {shape}\n\n\
         If information is missing, use null or empty values.\n\
         Never return extra text outside the JSON object.\n\n\
         {source_label}:\n\"\"\"{text}\"\"\"\n"
    )
}

/// Build the comparison prompt for one request and its serialized proposals.
pub fn build_comparison_prompt(request: &Request, proposals_json: &str) -> String {
    format!(
        "You are helping evaluate vendor proposals for an RFP.\n\n\
         RFP Title: {title}\n\
         Requirements: {description}\n\n\
         Here are the vendor proposals in JSON:\n\n\
         {proposals_json}\n\n\
         Compare the vendors across:\n\
         - Total price\n\
         - Item-level pricing\n\
         - Delivery time\n\
         - Warranty terms\n\
         - Payment terms\n\
         - Completeness of response\n\n\
         Then produce ONLY this JSON output:\n\n\
         {shape}\n",
        title = request.title,
        shape = COMPARISON_SHAPE,
        description = request.description,
    )
}
