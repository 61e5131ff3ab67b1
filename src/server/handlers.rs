//! Route handlers.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::AppState;
use super::error::ApiError;
use super::uploads::StagedUploads;
use crate::attachments::InboundAttachment;
use crate::inbound::InboundMessage;
use crate::model::NewCounterparty;
use crate::outbound::{DispatchOptions, dispatch_request};

// ── Health ──────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "rfp-intake"
    }))
}

// ── Inbound webhook ─────────────────────────────────────────────────

/// Multipart webhook: text fields form the message, file fields are written
/// to the uploads directory and passed on as disk-backed attachments. The
/// files are kept only when the proposal is stored.
pub async fn inbound_webhook(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut fields = HashMap::new();
    let mut uploads = StagedUploads::new(&state.uploads_dir);
    let mut attachments = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("unreadable upload: {e}")))?;
                let size = bytes.len() as u64;
                let path = uploads
                    .stage(&filename, Utc::now().timestamp_millis(), bytes)
                    .await
                    .map_err(|e| {
                        ApiError::new(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            format!("failed to store upload: {e}"),
                        )
                    })?;
                attachments.push(InboundAttachment::from_disk(filename, media_type, size, path));
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("unreadable field {name}: {e}")))?;
                fields.insert(name, value);
            }
        }
    }

    let message = InboundMessage::from_form_fields(&fields);
    let proposal = state.ingestion.ingest(&message, &attachments).await?;
    let kept = uploads.keep();
    debug!(proposal_id = %proposal.id, files = kept.len(), "Kept uploads");

    Ok(Json(json!({
        "success": true,
        "proposalId": proposal.id,
    })))
}

// ── Request parsing ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub text: String,
}

fn required_text(body: &TextBody) -> Result<&str, ApiError> {
    let text = body.text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("text is required"));
    }
    Ok(text)
}

pub async fn parse_request(
    State(state): State<AppState>,
    Json(body): Json<TextBody>,
) -> Result<Json<Value>, ApiError> {
    let text = required_text(&body)?;
    let draft = state.extraction.extract_request(text).await?;
    Ok(Json(json!({ "parsed": draft })))
}

pub async fn create_request(
    State(state): State<AppState>,
    Json(body): Json<TextBody>,
) -> Result<impl IntoResponse, ApiError> {
    let text = required_text(&body)?;
    let draft = state.extraction.extract_request(text).await?;
    let request = state.store.create_request(&draft.into_new_request(text)).await?;
    info!(request_id = %request.id, title = %request.title, "Request created from text");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "rfp": request })),
    ))
}

// ── Proposal parsing ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalTextBody {
    #[serde(default)]
    pub text: String,
    #[serde(default, alias = "rfp", alias = "rfpId")]
    pub request_id: String,
    #[serde(default, alias = "vendor", alias = "vendorId")]
    pub counterparty_id: String,
}

pub async fn parse_proposal(
    State(state): State<AppState>,
    Json(body): Json<ProposalTextBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.request_id.trim().is_empty() || body.counterparty_id.trim().is_empty() {
        return Err(ApiError::bad_request(
            "request and counterparty ids are required to create a proposal",
        ));
    }
    let proposal = state
        .ingestion
        .ingest_text(body.request_id.trim(), body.counterparty_id.trim(), &body.text)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "proposal": proposal })),
    ))
}

// ── Counterparties ──────────────────────────────────────────────────

pub async fn create_counterparty(
    State(state): State<AppState>,
    Json(body): Json<NewCounterparty>,
) -> Result<impl IntoResponse, ApiError> {
    if body.name.trim().is_empty() || body.email.trim().is_empty() {
        return Err(ApiError::bad_request("name and email are required"));
    }
    let counterparty = state.store.create_counterparty(&body).await?;
    Ok((StatusCode::CREATED, Json(json!(counterparty))))
}

// ── Per-request operations ──────────────────────────────────────────

pub async fn send_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<DispatchOptions>>,
) -> Result<Json<Value>, ApiError> {
    let options = body.map(|Json(o)| o).unwrap_or_default();
    let report = dispatch_request(&state.store, state.notifier.as_ref(), &id, &options).await?;
    Ok(Json(json!({
        "message": "Send completed",
        "sent": report.sent,
        "errors": report.errors,
    })))
}

pub async fn compare_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let report = state.comparison.compare_request(&id).await?;
    Ok(Json(json!(report)))
}
