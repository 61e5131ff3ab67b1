//! Mapping of domain errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::{
    ComparisonError, DatabaseError, DispatchError, ExtractionError, InboundError, IngestionError,
    LlmError,
};

/// An error on its way out as a JSON response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Raw model output for parse failures.
    pub payload: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            payload: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "success": false, "error": self.message });
        if let Some(payload) = self.payload {
            body["payload"] = json!(payload);
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        let status = if e.is_configuration() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::BAD_GATEWAY
        };
        Self::new(status, e.to_string())
    }
}

impl From<ExtractionError> for ApiError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::Llm(e) => e.into(),
            ExtractionError::Parse { ref payload, .. } => Self {
                status: StatusCode::BAD_GATEWAY,
                payload: Some(payload.clone()),
                message: e.to_string(),
            },
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            DatabaseError::Conflict(_) => Self::new(StatusCode::CONFLICT, e.to_string()),
            _ => Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

impl From<InboundError> for ApiError {
    fn from(e: InboundError) -> Self {
        let status = match e {
            InboundError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            InboundError::UnknownCounterparty { .. } | InboundError::MissingCorrelation => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            InboundError::UnknownRequest { .. } | InboundError::UnknownCounterpartyId { .. } => {
                StatusCode::NOT_FOUND
            }
            InboundError::Database(e) => return e.into(),
        };
        Self::new(status, e.to_string())
    }
}

impl From<IngestionError> for ApiError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::Inbound(e) => e.into(),
            IngestionError::Extraction(e) => e.into(),
            IngestionError::Database(e) => e.into(),
        }
    }
}

impl From<ComparisonError> for ApiError {
    fn from(e: ComparisonError) -> Self {
        match e {
            ComparisonError::NoProposals { .. } => Self::bad_request(e.to_string()),
            ComparisonError::UnknownRequest { .. } => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            ComparisonError::Extraction(e) => e.into(),
            ComparisonError::Database(e) => e.into(),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::UnknownRequest { .. } => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            DispatchError::NoRecipients(_) => Self::bad_request(e.to_string()),
            DispatchError::SendFailed(_) => Self::new(StatusCode::BAD_GATEWAY, e.to_string()),
            DispatchError::Database(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn configuration_is_500_upstream_is_502() {
        let config: ApiError = LlmError::MissingApiKey {
            provider: "gemini".into(),
        }
        .into();
        assert_eq!(config.status, StatusCode::INTERNAL_SERVER_ERROR);

        let upstream: ApiError = LlmError::Timeout {
            provider: "gemini".into(),
            timeout: Duration::from_secs(60),
        }
        .into();
        assert_eq!(upstream.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn parse_error_carries_payload() {
        let err: ApiError = IngestionError::Extraction(ExtractionError::Parse {
            payload: "not json".into(),
            reason: "no object".into(),
        })
        .into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.payload.as_deref(), Some("not json"));
    }

    #[test]
    fn inbound_shape_problems_are_4xx() {
        for e in [
            InboundError::InvalidMessage("x".into()),
            InboundError::MissingCorrelation,
            InboundError::UnknownCounterparty {
                email: "a@b.c".into(),
            },
            InboundError::UnknownRequest { id: "x".into() },
        ] {
            let api: ApiError = e.into();
            assert!(api.status.is_client_error(), "{:?}", api);
        }
    }

    #[test]
    fn no_proposals_is_400() {
        let api: ApiError = ComparisonError::NoProposals {
            request_id: "x".into(),
        }
        .into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn duplicate_record_is_409() {
        let api: ApiError = DatabaseError::Conflict("email taken".into()).into();
        assert_eq!(api.status, StatusCode::CONFLICT);
    }
}
