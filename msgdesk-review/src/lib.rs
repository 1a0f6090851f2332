//! msgdesk-review library - message review and labelling service
//!
//! The engine loads a semi-structured message record set from a blob
//! store, serves filtered/sorted/paginated views of it, applies relevance
//! labels with optimistic concurrency, and exports the relevant subset.

use axum::http::{HeaderValue, Method};
use axum::Router;
use msgdesk_common::api::{TokenStore, UserRepository};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod filter;
pub mod label;
pub mod loader;
pub mod pagination;
pub mod record;
pub mod store;

use engine::ReviewEngine;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReviewEngine>,
    pub users: Arc<dyn UserRepository>,
    pub tokens: Arc<TokenStore>,
    /// False disables the bearer-token check on every route
    pub auth_enabled: bool,
}

impl AppState {
    pub fn new(
        engine: Arc<ReviewEngine>,
        users: Arc<dyn UserRepository>,
        tokens: Arc<TokenStore>,
        auth_enabled: bool,
    ) -> Self {
        Self {
            engine,
            users,
            tokens,
            auth_enabled,
        }
    }
}

/// Build application router
///
/// `/health`, `/api/buildinfo` and the auth endpoints are public; every
/// other `/api` route goes through [`api::auth_middleware`].
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route("/api/messages", get(api::get_messages))
        .route("/api/overview", get(api::get_overview))
        .route("/api/channels", get(api::get_channels))
        .route("/api/filter", post(api::filter_messages))
        .route("/api/page/:offset", get(api::get_page))
        .route("/api/label", post(api::label_message))
        .route("/api/export", get(api::export_relevant))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .route("/api/auth/register", post(api::register))
        .route("/api/auth/login", post(api::login))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy for the configured origins; empty means any origin
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(parsed)
}
