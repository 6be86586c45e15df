//! Documentation of the ChefZero recipe service.
//!
//! Users pick what they have in the fridge, get matching recipes from the catalog, and can ask an
//! LLM for a new recipe. A few AI recipes are free every week, more can be bought.
//!
//!
//!
//! # General Infrastructure
//! - Catalog (categories, items, recipes) is loaded once at startup from `BANK_PATH`, either a
//!   JSON seed, a compiled `.bin` bank from the `process` CLI, or a remote `.bin` over HTTP
//! - Everything in the catalog is immutable and shared through one `Arc<AppState>`
//! - Per-user entitlements and payments live in the document store, Redis when `REDIS_URL` is
//!   set, JSON files under `DATA_DIR` otherwise
//! - Gemini and CryptoCloud are the only outbound calls, both with client timeouts
//!
//!
//!
//! # Endpoints
//!
//! | Method & path | Notes |
//! |---|---|
//! | `GET /api/health` | liveness |
//! | `GET /api/products` | flat items and categories |
//! | `GET /api/products/search?q=` | live search, 2+ characters |
//! | `GET /api/recipes/popular` | first few catalog recipes |
//! | `POST /api/recipes/find` | `{products: [id]}` or `{ingredients: [name]}` |
//! | `POST /api/ai/generate` | spends a credit, always answers with a recipe |
//! | `GET /api/user/limits?userId=` | entitlement view |
//! | `POST /api/user/consume` | spends a credit without generating |
//! | `POST /api/payment/create` | invoice for `pack` or `monthly` |
//! | `GET /api/payment/status/{id}` | polls the invoice, applies the plan once |
//!
//! Errors are `{kind, message, retryable}` with the matching status code, see [`error::AppError`].
//!
//!
//!
//! # Entitlements
//!
//! - Free credits refill to `FREE_LIMIT` every `RESET_PERIOD_DAYS`, checked lazily on access
//! - Paid credits never expire and are only spent once the free ones are gone
//! - Premium is an expiry timestamp, while active nothing is counted
//!
//!
//!
//! # Setup
//!
//! Compile the seed into a binary bank.
//! ```sh
//! cargo run -p process -- data/seed.json data/bank.bin
//! ```
//!
//! Run the server.
//! ```sh
//! RUST_LOG=info cargo run -p chefzero
//! ```
//!
//! Log raw Gemini answers.
//! ```sh
//! cargo run -p chefzero --features server/verbose
//! ```
use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod entitlement;
pub mod error;
pub mod gateway;
pub mod matcher;
pub mod payment;
pub mod routes;
pub mod search;
pub mod state;
pub mod utils;

use routes::{
    consume_handler, find_handler, generate_handler, health_handler, limits_handler,
    payment_create_handler, payment_status_handler, popular_handler, products_handler,
    search_handler,
};
use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/products", get(products_handler))
        .route("/api/products/search", get(search_handler))
        .route("/api/recipes/popular", get(popular_handler))
        .route("/api/recipes/find", post(find_handler))
        .route("/api/ai/generate", post(generate_handler))
        .route("/api/user/limits", get(limits_handler))
        .route("/api/user/consume", post(consume_handler))
        .route("/api/payment/create", post(payment_create_handler))
        .route("/api/payment/status/{id}", get(payment_status_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
