//! Shoptalk server library.
//!
//! A storefront backend with two faces: a REST admin surface (products,
//! orders, persona settings) and a conversational surface where a language
//! model answers shoppers and places orders through a closed set of tools.
//! The model never touches storage directly; every effect flows through
//! validated tool inputs into the same engine code the REST surface uses.
//!
//! Exposed as a library so integration tests can drive the real router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod tools;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::state::AppState;

/// Build the application router over the given state.
///
/// The same router serves production and integration tests.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                status = tracing::field::Empty,
            )
        })
        .on_response(
            |response: &axum::http::Response<_>, latency: std::time::Duration, span: &Span| {
                span.record("status", response.status().as_u16());
                let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                tracing::info!(latency_ms, "request served");
            },
        );

    Router::new()
        .merge(routes::health_routes())
        .nest("/api", routes::api_routes())
        .layer(trace)
        .with_state(state)
}
