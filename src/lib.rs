//! Storefront payments
//!
//! PayTR iFrame token issuance and payment-callback reconciliation for the
//! storefront, with inert iyzico and Papara adapters behind the same interface.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod providers;
pub mod repositories;
pub mod services;
pub mod signature;
pub mod tracing;
pub mod webhooks;

use axum::{http::HeaderValue, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::config::AppConfig;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: handlers::AppServices,
}

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/payments", handlers::payments::payment_routes())
        .nest("/orders", handlers::orders::order_routes())
        .nest("/checkout", handlers::checkout::checkout_routes())
}

/// Builds the CORS layer from `cors_allowed_origins`. Without a list, development
/// is permissive and every other environment allows no cross-origin callers.
pub fn cors_layer(cfg: &AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    match configured_origins {
        Some(origins) => CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
        None if cfg.is_development() => {
            ::tracing::info!("Using permissive CORS in the development environment");
            CorsLayer::permissive()
        }
        None => {
            ::tracing::warn!("No CORS origins configured; cross-origin requests will be refused");
            CorsLayer::new()
        }
    }
}

/// Full HTTP surface: health, docs and `/api/v1`, with tracing, CORS, timeout
/// and request-id layers.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::<AppState>::new()
        .nest("/health", handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::openapi_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_origins_are_used_outside_development() {
        let mut cfg = AppConfig::new(
            "memory://".into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
        );
        cfg.cors_allowed_origins = Some("https://shop.example.com, ,https://admin.example.com".into());
        // Layer construction must not panic on blank entries
        let _ = cors_layer(&cfg);
    }
}
