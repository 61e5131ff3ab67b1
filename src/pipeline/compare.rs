//! Comparison of all proposals for one request.
//!
//! One prompt carries the request and every proposal; the reply is recovered
//! with the same two-tier JSON strategy as extraction. The result is a
//! transient view and is never persisted.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::config::ComparisonConfig;
use crate::error::{ComparisonError, ExtractionError};
use crate::extraction::StructuredExtractionClient;
use crate::extraction::prompts::build_comparison_prompt;
use crate::extraction::recovery::JsonObject;
use crate::extraction::shapes::{array_field, days_field, decimal_field, lookup, string_field};
use crate::model::{ComparisonResult, ComparisonRow, ExtractedProposal, Recommendation, Request};
use crate::store::ProcurementStore;

/// Comparison result plus the request it covers and how many proposals fed it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub request_id: String,
    pub vendor_count: usize,
    #[serde(flatten)]
    pub result: ComparisonResult,
}

/// Ranks proposals for a request through the model.
pub struct ComparisonAggregator {
    store: Arc<dyn ProcurementStore>,
    extraction: Arc<StructuredExtractionClient>,
    config: ComparisonConfig,
}

impl ComparisonAggregator {
    pub fn new(
        store: Arc<dyn ProcurementStore>,
        extraction: Arc<StructuredExtractionClient>,
        config: ComparisonConfig,
    ) -> Self {
        Self {
            store,
            extraction,
            config,
        }
    }

    /// Load a request and its proposals, then compare them.
    pub async fn compare_request(&self, request_id: &str) -> Result<ComparisonReport, ComparisonError> {
        let request = self
            .store
            .find_request_by_id(request_id)
            .await?
            .ok_or_else(|| ComparisonError::UnknownRequest {
                id: request_id.to_string(),
            })?;
        let proposals = self.store.find_proposals_by_request(&request.id).await?;

        let result = self.compare(&request, &proposals).await?;
        Ok(ComparisonReport {
            request_id: request.id,
            vendor_count: proposals.len(),
            result,
        })
    }

    /// Compare `proposals` against `request`. Fails before any model call when empty.
    pub async fn compare(
        &self,
        request: &Request,
        proposals: &[ExtractedProposal],
    ) -> Result<ComparisonResult, ComparisonError> {
        if proposals.is_empty() {
            return Err(ComparisonError::NoProposals {
                request_id: request.id.clone(),
            });
        }

        let names = self.counterparty_names(proposals).await?;
        let proposals_json = serialize_proposals(proposals, &names);
        let prompt = build_comparison_prompt(request, &proposals_json);

        info!(
            request_id = %request.id,
            proposals = proposals.len(),
            "Comparing proposals"
        );

        match self.extraction.complete_json(prompt).await {
            Ok(obj) => Ok(parse_comparison(&obj)),
            Err(ExtractionError::Llm(e)) if e.is_upstream() && self.config.fallback_to_price_ranking => {
                warn!(request_id = %request.id, error = %e, "Model comparison failed, ranking by price");
                Ok(rank_by_price(proposals, &names))
            }
            Err(e) => {
                error!(request_id = %request.id, error = %e, "Comparison failed");
                Err(e.into())
            }
        }
    }

    /// Display name per proposal, falling back to the counterparty id.
    async fn counterparty_names(
        &self,
        proposals: &[ExtractedProposal],
    ) -> Result<Vec<String>, ComparisonError> {
        let mut names = Vec::with_capacity(proposals.len());
        for proposal in proposals {
            let name = self
                .store
                .find_counterparty_by_id(&proposal.counterparty_id)
                .await?
                .map(|c| c.name)
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| proposal.counterparty_id.clone());
            names.push(name);
        }
        Ok(names)
    }
}

fn serialize_proposals(proposals: &[ExtractedProposal], names: &[String]) -> String {
    let entries: Vec<Value> = proposals
        .iter()
        .zip(names)
        .map(|(p, name)| {
            json!({
                "vendor": name,
                "items": p.items,
                "totalPrice": p.total_price,
                "currency": p.currency,
                "paymentTerms": p.payment_terms,
                "warranty": p.warranty,
                "deliveryDays": p.delivery_days,
            })
        })
        .collect();
    serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
}

/// Permissive decode of the model's comparison object.
fn parse_comparison(obj: &JsonObject) -> ComparisonResult {
    let rows = array_field(obj, &["comparisonTable", "comparison_table", "rows"])
        .iter()
        .filter_map(Value::as_object)
        .map(|row| ComparisonRow {
            counterparty: string_field(row, &["vendor", "counterparty", "vendorName", "name"]),
            total_price: decimal_field(row, &["totalPrice", "total_price", "total"]),
            delivery_days: days_field(row, &["deliveryDays", "delivery_days"]),
            warranty: string_field(row, &["warranty"]),
            payment_terms: string_field(row, &["paymentTerms", "payment_terms"]),
            score: score_field(row),
        })
        .collect();

    let recommendation = match lookup(obj, &["recommendation"]) {
        Some(Value::Object(rec)) => Some(Recommendation {
            counterparty: string_field(rec, &["vendor", "counterparty", "name"]),
            reason: string_field(rec, &["reason"]),
        }),
        Some(Value::String(name)) => Some(Recommendation {
            counterparty: name.trim().to_string(),
            reason: String::new(),
        }),
        _ => None,
    }
    .filter(|r| !r.counterparty.is_empty());

    ComparisonResult {
        summary: string_field(obj, &["summary"]),
        rows,
        recommendation,
    }
}

fn score_field(row: &JsonObject) -> f64 {
    match lookup(row, &["score"]) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Baseline ranking by ascending total price; unpriced proposals last.
fn rank_by_price(proposals: &[ExtractedProposal], names: &[String]) -> ComparisonResult {
    let mut ranked: Vec<(&ExtractedProposal, &String)> = proposals.iter().zip(names).collect();
    ranked.sort_by(|(a, _), (b, _)| match (a.total_price, b.total_price) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let count = ranked.len() as f64;
    let rows: Vec<ComparisonRow> = ranked
        .iter()
        .enumerate()
        .map(|(rank, (p, name))| ComparisonRow {
            counterparty: (*name).clone(),
            total_price: p.total_price,
            delivery_days: p.delivery_days,
            warranty: p.warranty.clone(),
            payment_terms: p.payment_terms.clone(),
            score: if p.total_price.is_some() {
                ((count - rank as f64) / count * 100.0).round()
            } else {
                0.0
            },
        })
        .collect();

    let recommendation = ranked
        .first()
        .and_then(|(p, name)| p.total_price.map(|price| (price, name)))
        .map(|(price, name)| Recommendation {
            counterparty: (*name).clone(),
            reason: format!("Lowest total price ({})", format_price(price, &ranked[0].0.currency)),
        });

    ComparisonResult {
        summary: "Model comparison unavailable; proposals ranked by total price only.".to_string(),
        rows,
        recommendation,
    }
}

fn format_price(price: Decimal, currency: &str) -> String {
    if currency.is_empty() {
        price.normalize().to_string()
    } else {
        format!("{} {currency}", price.normalize())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::model::{NewCounterparty, NewProposal, NewRequest};
    use crate::store::LibSqlBackend;

    enum Reply {
        Text(&'static str),
        Unavailable,
        NoKey,
    }

    struct StubLlm {
        reply: Reply,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Text(text) => Ok(CompletionResponse {
                    content: text.to_string(),
                    input_tokens: 0,
                    output_tokens: 0,
                }),
                Reply::Unavailable => Err(LlmError::RequestFailed {
                    provider: "stub".into(),
                    reason: "HTTP 503".into(),
                }),
                Reply::NoKey => Err(LlmError::MissingApiKey {
                    provider: "stub".into(),
                }),
            }
        }
    }

    async fn setup(
        reply: Reply,
        fallback: bool,
        prices: &[Option<Decimal>],
    ) -> (ComparisonAggregator, Arc<StubLlm>, String) {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let request = store
            .create_request(&NewRequest {
                title: "Chairs".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        for (i, price) in prices.iter().enumerate() {
            let vendor = store
                .create_counterparty(&NewCounterparty {
                    name: format!("Vendor {i}"),
                    email: format!("v{i}@example.com"),
                    ..Default::default()
                })
                .await
                .unwrap();
            store
                .create_proposal(&NewProposal {
                    request_id: request.id.clone(),
                    counterparty_id: vendor.id,
                    total_price: *price,
                    currency: "USD".into(),
                    parsed: true,
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let llm = Arc::new(StubLlm {
            reply,
            calls: AtomicUsize::new(0),
        });
        let aggregator = ComparisonAggregator::new(
            store,
            Arc::new(StructuredExtractionClient::new(llm.clone())),
            ComparisonConfig {
                fallback_to_price_ranking: fallback,
            },
        );
        (aggregator, llm, request.id)
    }

    #[tokio::test]
    async fn no_proposals_fails_before_model_call() {
        let (aggregator, llm, request_id) = setup(Reply::Text("{}"), false, &[]).await;

        let err = aggregator.compare_request(&request_id).await.unwrap_err();
        assert!(matches!(err, ComparisonError::NoProposals { .. }));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_request() {
        let (aggregator, _, _) = setup(Reply::Text("{}"), false, &[]).await;
        let err = aggregator
            .compare_request("ffffffffffffffffffffffff")
            .await
            .unwrap_err();
        assert!(matches!(err, ComparisonError::UnknownRequest { .. }));
    }

    #[tokio::test]
    async fn recovers_table_from_wrapped_output() {
        let reply = "Here you go:\n```json\n{\"summary\": \"B is cheaper\", \
            \"comparisonTable\": [\
              {\"vendor\": \"Vendor 1\", \"totalPrice\": 400, \"deliveryDays\": 7, \"score\": 88},\
              {\"vendor\": \"Vendor 0\", \"totalPrice\": \"$500\", \"score\": \"70.5\"}], \
            \"recommendation\": {\"vendor\": \"Vendor 1\", \"reason\": \"Lowest price\"}}\n```";
        let (aggregator, llm, request_id) =
            setup(Reply::Text(reply), false, &[Some(dec!(500)), Some(dec!(400))]).await;

        let report = aggregator.compare_request(&request_id).await.unwrap();
        assert_eq!(report.vendor_count, 2);
        assert_eq!(report.result.summary, "B is cheaper");
        assert_eq!(report.result.rows.len(), 2);
        assert_eq!(report.result.rows[0].total_price, Some(dec!(400)));
        assert_eq!(report.result.rows[1].total_price, Some(dec!(500)));
        assert_eq!(report.result.rows[1].score, 70.5);
        assert_eq!(report.result.rows[1].delivery_days, None);
        let rec = report.result.recommendation.unwrap();
        assert_eq!(rec.counterparty, "Vendor 1");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn report_serializes_flat() {
        let (aggregator, _, request_id) =
            setup(Reply::Text(r#"{"summary": "ok"}"#), false, &[Some(dec!(1))]).await;
        let report = aggregator.compare_request(&request_id).await.unwrap();

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["requestId"], request_id.as_str());
        assert_eq!(value["vendorCount"], 1);
        assert_eq!(value["summary"], "ok");
        assert!(value["recommendation"].is_null());
    }

    #[tokio::test]
    async fn unparsable_output_is_parse_error() {
        let (aggregator, _, request_id) =
            setup(Reply::Text("no json here"), true, &[Some(dec!(1))]).await;
        let err = aggregator.compare_request(&request_id).await.unwrap_err();
        assert!(matches!(err, ComparisonError::Extraction(ExtractionError::Parse { .. })));
    }

    #[tokio::test]
    async fn upstream_failure_without_fallback_propagates() {
        let (aggregator, _, request_id) =
            setup(Reply::Unavailable, false, &[Some(dec!(1))]).await;
        let err = aggregator.compare_request(&request_id).await.unwrap_err();
        assert!(matches!(err, ComparisonError::Extraction(ExtractionError::Llm(_))));
    }

    #[tokio::test]
    async fn upstream_failure_with_fallback_ranks_by_price() {
        let (aggregator, _, request_id) = setup(
            Reply::Unavailable,
            true,
            &[None, Some(dec!(900)), Some(dec!(300.50))],
        )
        .await;

        let report = aggregator.compare_request(&request_id).await.unwrap();
        let rows = &report.result.rows;
        assert_eq!(rows[0].counterparty, "Vendor 2");
        assert_eq!(rows[1].counterparty, "Vendor 1");
        assert_eq!(rows[2].counterparty, "Vendor 0");
        assert_eq!(rows[0].score, 100.0);
        assert_eq!(rows[2].score, 0.0);

        let rec = report.result.recommendation.unwrap();
        assert_eq!(rec.counterparty, "Vendor 2");
        assert_eq!(rec.reason, "Lowest total price (300.5 USD)");
    }

    #[tokio::test]
    async fn missing_key_never_falls_back() {
        let (aggregator, _, request_id) = setup(Reply::NoKey, true, &[Some(dec!(1))]).await;
        let err = aggregator.compare_request(&request_id).await.unwrap_err();
        assert!(matches!(
            err,
            ComparisonError::Extraction(ExtractionError::Llm(ref e)) if e.is_configuration()
        ));
    }

    #[test]
    fn string_recommendation_accepted() {
        let obj = json!({ "recommendation": "Vendor 3" });
        let result = parse_comparison(obj.as_object().unwrap());
        assert_eq!(result.recommendation.unwrap().counterparty, "Vendor 3");
        assert!(result.rows.is_empty());
        assert_eq!(result.summary, "");
    }
}
