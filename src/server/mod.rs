//! HTTP surface: webhook, parse, compare and dispatch endpoints.

pub mod error;
pub mod handlers;
pub mod uploads;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::attachments::AttachmentTextExtractor;
use crate::config::AppConfig;
use crate::extraction::StructuredExtractionClient;
use crate::llm::LlmProvider;
use crate::outbound::Notifier;
use crate::pipeline::{ComparisonAggregator, ProposalIngestionOrchestrator};
use crate::store::ProcurementStore;

pub use error::ApiError;

/// Webhook bodies carry up to ten attachments of 8 MiB each.
const MAX_WEBHOOK_BODY: usize = 10 * 8 * 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProcurementStore>,
    pub extraction: Arc<StructuredExtractionClient>,
    pub ingestion: Arc<ProposalIngestionOrchestrator>,
    pub comparison: Arc<ComparisonAggregator>,
    pub notifier: Arc<dyn Notifier>,
    /// Where webhook uploads are written.
    pub uploads_dir: PathBuf,
}

impl AppState {
    /// Wire every component from explicit configuration.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn ProcurementStore>,
        llm: Arc<dyn LlmProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let extraction = Arc::new(StructuredExtractionClient::new(llm));
        let ingestion = Arc::new(ProposalIngestionOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&extraction),
            AttachmentTextExtractor::new(),
        ));
        let comparison = Arc::new(ComparisonAggregator::new(
            Arc::clone(&store),
            Arc::clone(&extraction),
            config.comparison.clone(),
        ));

        Self {
            store,
            extraction,
            ingestion,
            comparison,
            notifier,
            uploads_dir: config.storage.uploads_dir.clone(),
        }
    }
}

/// Build the Axum router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/email/inbound",
            post(handlers::inbound_webhook).layer(DefaultBodyLimit::max(MAX_WEBHOOK_BODY)),
        )
        .route("/api/ai/parse-rfp", post(handlers::parse_request))
        .route("/api/ai/create-rfp", post(handlers::create_request))
        .route("/api/proposals/parse", post(handlers::parse_proposal))
        .route("/api/vendors", post(handlers::create_counterparty))
        .route("/api/rfps/{id}/send", post(handlers::send_request))
        .route("/api/rfps/{id}/compare", get(handlers::compare_request))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
