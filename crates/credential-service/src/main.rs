//! Credential Service
//!
//! gRPC server for user registration and token-based authentication.
//!
//! # Servers
//!
//! - gRPC server for `CreateUser` / `Authenticate` (default: 0.0.0.0:50051)
//! - HTTP server for health endpoints and metrics (default: 0.0.0.0:8081)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Connect the user store (runs migrations for SQL backends)
//! 4. Build the token issuer (fails on an unusable signing key)
//! 5. Start health HTTP server
//! 6. Start gRPC server
//! 7. Wait for shutdown signal

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)]

use std::net::SocketAddr;
use std::sync::Arc;

use credential_service::config::Config;
use credential_service::grpc::{build_server, server_tls_config, AuthGrpcService};
use credential_service::observability::{
    health_router, CredentialMetrics, HealthState, DEFAULT_LOG_FILTER,
};
use credential_service::repositories::connect_store;
use credential_service::services::{CredentialService, TokenIssuer, TokenPolicy};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Credential Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        grpc_bind_address = %config.grpc_bind_address,
        health_bind_address = %config.health_bind_address,
        database = config.database.kind.as_str(),
        request_timeout_secs = config.request_timeout.as_secs(),
        bcrypt_cost = config.bcrypt_cost,
        tls_enabled = config.tls.enabled,
        "Configuration loaded successfully"
    );

    info!("Initializing Prometheus metrics recorder...");
    let prometheus_handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        format!("Failed to install Prometheus metrics recorder: {e}")
    })?;

    let health_state = Arc::new(HealthState::new());

    info!(backend = config.database.kind.as_str(), "Connecting user store...");
    let store = connect_store(&config.database).await.map_err(|e| {
        error!(error = %e, "Failed to connect user store");
        e
    })?;

    let token_policy = TokenPolicy::try_from(&config.token).map_err(|e| {
        error!(error = %e, "Invalid token configuration");
        e
    })?;
    let issuer = TokenIssuer::new(token_policy).map_err(|e| {
        error!(error = %e, "Failed to initialize token issuer");
        e
    })?;
    info!(algorithm = ?issuer.algorithm(), "Token issuer ready");

    let service = Arc::new(CredentialService::new(
        store,
        config.password_policy,
        issuer,
        config.bcrypt_cost,
        CredentialMetrics::new(),
    ));

    let shutdown_token = CancellationToken::new();

    // Health server must bind before the gRPC server starts accepting.
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;
    let app = health_router(Arc::clone(&health_state), prometheus_handle);
    let listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let health_shutdown_token = shutdown_token.child_token();
    let health_task = tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    let grpc_addr: SocketAddr = config.grpc_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.grpc_bind_address, "Invalid gRPC bind address");
        format!("Invalid gRPC bind address: {e}")
    })?;

    let tls = server_tls_config(&config.tls).map_err(|e| {
        error!(error = %e, "Failed to load TLS material");
        e
    })?;

    let auth_service = AuthGrpcService::new(Arc::clone(&service), shutdown_token.clone());
    let router = build_server(auth_service, config.request_timeout, tls).map_err(|e| {
        error!(error = %e, "Failed to configure gRPC server");
        e
    })?;

    let grpc_shutdown_token = shutdown_token.child_token();
    let grpc_task = tokio::spawn(async move {
        info!(addr = %grpc_addr, "gRPC server starting");
        let result = router
            .serve_with_shutdown(grpc_addr, async move {
                grpc_shutdown_token.cancelled().await;
                info!("gRPC server shutting down");
            })
            .await;
        if let Err(e) = result {
            error!(error = %e, "gRPC server failed");
        }
    });

    health_state.set_ready();
    info!("Credential Service running - press Ctrl+C to shutdown");

    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Readiness flips first so load balancers stop routing new requests.
    health_state.set_not_ready();
    shutdown_token.cancel();

    if let Err(e) = grpc_task.await {
        error!(error = %e, "gRPC server task panicked");
    }
    if let Err(e) = health_task.await {
        error!(error = %e, "Health server task panicked");
    }

    let snapshot = service.metrics().snapshot();
    info!(
        registrations_succeeded = snapshot.registrations_succeeded,
        authentications_succeeded = snapshot.authentications_succeeded,
        authentications_failed = snapshot.authentications_failed,
        tokens_issued = snapshot.tokens_issued,
        "Credential Service shutdown complete"
    );
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("CS_LOG_FORMAT").is_ok_and(|format| format == "json");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
