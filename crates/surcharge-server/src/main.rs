//! surcharge HTTP Server
//!
//! Axum-based server for the checkout page: session bootstrap, the
//! background payment-method update and the surcharge settings admin.

mod config;
mod handlers;
mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::handlers::{
    AJAX_PATH, ajax_handler, cart_totals, checkout_bootstrap, get_settings, health_check, save_settings_handler,
    settings_schema_handler, update_cart,
};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))

        // Checkout
        .route("/api/checkout", get(checkout_bootstrap))
        .route("/api/cart", post(update_cart))
        .route("/api/cart/totals", get(cart_totals))
        .route(AJAX_PATH, post(ajax_handler))

        // Admin
        .route("/admin/surcharges/schema", get(settings_schema_handler))
        .route("/admin/surcharges", get(get_settings).post(save_settings_handler))

        // Static files (WASM frontend)
        .fallback_service(ServeDir::new(static_dir))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    if config.nonce_secret.is_none() {
        tracing::warn!("⚠ SURCHARGE_NONCE_SECRET not set - tokens are invalidated on restart");
    }
    if config.admin_token.is_none() {
        tracing::warn!("⚠ ADMIN_TOKEN not set - settings admin is open");
    }

    let state = AppState::from_config(&config)?;

    tracing::info!("Registered {} payment gateways:", state.registry.len());
    for gateway in state.registry.iter() {
        tracing::info!(
            "  • {} ({}){}",
            gateway.id,
            gateway.title,
            if gateway.enabled { "" } else { " [disabled]" }
        );
    }

    let app = router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 surcharge server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                   - Health check");
    tracing::info!("  GET  /api/checkout             - Start checkout, issue token");
    tracing::info!("  POST /api/cart                 - Set cart amounts");
    tracing::info!("  GET  /api/cart/totals          - Cart totals with fees");
    tracing::info!("  POST /ajax                     - Background actions (update_surcharge)");
    tracing::info!("  GET  /admin/surcharges/schema  - Settings page schema");
    tracing::info!("  GET  /admin/surcharges         - Current settings");
    tracing::info!("  POST /admin/surcharges         - Save settings");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
