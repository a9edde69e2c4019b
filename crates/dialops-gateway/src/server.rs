//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use dialops_core::DialopsConfig;
use dialops_core::traits::Dialer;
use dialops_provider::VoiceClient;
use dialops_scheduler::{BatchScheduler, SharedScheduler};
use dialops_store::TableStore;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub config: DialopsConfig,
    /// Voice provider client — also the scheduler's dialer.
    pub provider: Arc<VoiceClient>,
    /// Contacts table backend.
    pub store: Arc<TableStore>,
    /// The batch scheduler engine.
    pub scheduler: SharedScheduler,
    pub pairing_code: Option<String>,
    pub start_time: std::time::Instant,
}

/// Pairing code auth middleware — validates X-Pairing-Code header or ?code= query.
async fn require_pairing(
    State(state): State<Arc<AppState>>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    // If no pairing code configured, allow all
    let Some(expected) = &state.pairing_code else {
        return next.run(req).await;
    };

    let from_header = req
        .headers()
        .get("X-Pairing-Code")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if from_header == expected {
        return next.run(req).await;
    }

    if let Some(query) = req.uri().query() {
        for pair in query.split('&') {
            if let Some(code) = pair.strip_prefix("code=")
                && code == expected
            {
                return next.run(req).await;
            }
        }
    }

    axum::response::Response::builder()
        .status(axum::http::StatusCode::UNAUTHORIZED)
        .header("Content-Type", "application/json")
        .body(axum::body::Body::from(
            serde_json::json!({"ok": false, "error": "Unauthorized — invalid or missing pairing code"}).to_string()
        ))
        .unwrap()
}

/// Verify pairing code endpoint (public).
async fn verify_pairing(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let code = body["code"].as_str().unwrap_or("");
    match &state.pairing_code {
        Some(expected) if code == expected => Json(serde_json::json!({"ok": true})),
        Some(_) => Json(serde_json::json!({"ok": false, "error": "Invalid pairing code"})),
        None => Json(serde_json::json!({"ok": true})), // no code required
    }
}

/// Build the Axum router with all routes.
pub fn build_router(shared: Arc<AppState>) -> Router {
    // Protected routes — require valid pairing code
    let protected = Router::new()
        .route("/api/v1/info", get(super::routes::system_info))
        .route("/api/v1/metrics", get(super::routes::get_metrics))
        .route("/api/v1/agents", get(super::routes::list_agents))
        .route("/api/v1/history", get(super::routes::call_history))
        .route("/api/v1/history/{id}", get(super::routes::call_details))
        .route("/api/v1/history/{id}", delete(super::routes::delete_call))
        .route("/api/v1/history/{id}/audio", get(super::routes::call_audio))
        .route("/api/v1/contacts", get(super::routes::list_contacts))
        .route("/api/v1/contacts", delete(super::routes::clear_contacts))
        .route(
            "/api/v1/contacts/import",
            post(super::routes::import_contacts),
        )
        .route(
            "/api/v1/contacts/export",
            get(super::routes::export_contacts),
        )
        .route("/api/v1/call", post(super::routes::manual_call))
        .route(
            "/api/v1/scheduler/start",
            post(super::routes::scheduler_start),
        )
        .route(
            "/api/v1/scheduler/pause",
            post(super::routes::scheduler_pause),
        )
        .route(
            "/api/v1/scheduler/resume",
            post(super::routes::scheduler_resume),
        )
        .route(
            "/api/v1/scheduler/status",
            get(super::routes::scheduler_status),
        )
        .route(
            "/api/v1/scheduler/logs",
            delete(super::routes::scheduler_clear_logs),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            shared.clone(),
            require_pairing,
        ));

    // Public routes — no auth
    let public = Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/verify-pairing", post(verify_pairing));

    protected
        .merge(public)
        .layer(
            CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Build the shared state from a loaded config.
pub fn build_state(config: DialopsConfig) -> Arc<AppState> {
    let provider = Arc::new(VoiceClient::new(config.provider.clone()));
    let store = Arc::new(TableStore::new(config.store.clone()));
    let dialer: Arc<dyn Dialer> = provider.clone();
    let scheduler = BatchScheduler::shared(dialer, &config.scheduler);

    let pairing_code = if config.gateway.require_pairing {
        std::env::var("DIALOPS_PAIRING_CODE").ok().or_else(|| {
            let path = DialopsConfig::home_dir().join(".pairing_code");
            std::fs::read_to_string(path).ok().map(|s| s.trim().to_string())
        })
    } else {
        None
    };

    Arc::new(AppState {
        config,
        provider,
        store,
        scheduler,
        pairing_code,
        start_time: std::time::Instant::now(),
    })
}

/// Start the HTTP server and run until interrupted.
pub async fn start(config: DialopsConfig) -> anyhow::Result<()> {
    let state = build_state(config);
    let addr = format!(
        "{}:{}",
        state.config.gateway.host, state.config.gateway.port
    );
    let scheduler = state.scheduler.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            // Cancel any pending inter-batch timer before the process goes away
            scheduler.lock().await.shutdown();
            tracing::info!("👋 Gateway shutting down");
        })
        .await?;
    Ok(())
}
