//! Shoptalk server binary.
//!
//! Serves the storefront REST API and the conversational chat endpoint.
//!
//! # Startup
//!
//! 1. Load configuration from the environment (`.env` honored).
//! 2. Initialize tracing (`LOG_FORMAT=json` switches to structured output).
//! 3. Open the `SQLite` pool and run embedded migrations.
//! 4. Serve until Ctrl+C or SIGTERM, then shut down gracefully.

#![cfg_attr(not(test), forbid(unsafe_code))]

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shoptalk_server::config::ServerConfig;
use shoptalk_server::state::AppState;
use shoptalk_server::{build_router, db};

#[tokio::main]
async fn main() {
    let config = ServerConfig::from_env().expect("configuration error");

    init_tracing();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("could not open database");
    db::run_migrations(&pool).await.expect("migration failure");
    tracing::info!(database = %config.database_url, "database ready");

    let addr = config.socket_addr();
    let app = build_router(AppState::new(config, pool));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("could not bind listener");
    tracing::info!(%addr, "shoptalk-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server exited with error");
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` selects
/// JSON output for log aggregation.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("shoptalk_server=info,tower_http=info")
    });

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves once the process receives Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("shutdown signal received");
}
