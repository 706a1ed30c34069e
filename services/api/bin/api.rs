//! Main Entrypoint for the Duet API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the credential issuer and realtime provider.
//! 3. Starting one domain runtime (session actor, poll loops, realtime
//!    manager) per agent domain.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use duet_api::{
    config::Config,
    realtime::{RealtimeProvider, signal::SignalProvider},
    router::create_router,
    runtime::DomainRuntime,
    state::AppState,
};
use duet_access::CredentialIssuer;
use duet_core::AgentDomain;
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let config = Arc::new(config);
    let issuer = Arc::new(CredentialIssuer::new(config.access.clone()));
    let provider: Arc<dyn RealtimeProvider> = Arc::new(SignalProvider::default());

    // --- 4. Start Domain Runtimes ---
    let mut domains = HashMap::new();
    for domain in AgentDomain::ALL {
        let runtime =
            DomainRuntime::start(domain, &config, Arc::clone(&issuer), Arc::clone(&provider))
                .with_context(|| format!("Failed to start runtime for domain '{domain}'"))?;
        info!(%domain, backend = %config.backend_url(domain), "Domain runtime started");
        domains.insert(domain, runtime);
    }

    let app_state = Arc::new(AppState::new(Arc::clone(&config), issuer, domains));

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        bind_address = %config.bind_address,
        poll_interval_ms = %config.poll_interval.as_millis(),
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
