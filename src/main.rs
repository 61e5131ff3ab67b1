use std::sync::Arc;

use rfp_intake::config::AppConfig;
use rfp_intake::llm::create_provider;
use rfp_intake::outbound::LogNotifier;
use rfp_intake::server::{AppState, router};
use rfp_intake::store::{LibSqlBackend, ProcurementStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("📨 RFP Intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Database: {}", config.storage.db_path.display());
    eprintln!("   Uploads: {}", config.storage.uploads_dir.display());
    eprintln!("   Webhook: http://0.0.0.0:{}/api/email/inbound", config.server.port);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn ProcurementStore> =
        Arc::new(LibSqlBackend::new_local(&config.storage.db_path).await?);

    // ── LLM ──────────────────────────────────────────────────────────────
    let llm = create_provider(&config.llm)?;

    // ── HTTP ─────────────────────────────────────────────────────────────
    let state = AppState::new(&config, store, llm, Arc::new(LogNotifier));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.server.port)).await?;
    tracing::info!(port = config.server.port, "HTTP server started");
    axum::serve(listener, app).await?;

    Ok(())
}
