//! HTTP entry point for the control plane: the admission pipeline, route
//! handlers, and the CLI/bootstrap glue that wires them to a running server.
//! Exposed as a library so integration tests can assemble a router directly,
//! with [`main`] in `src/main.rs` a thin wrapper around [`run`].

pub mod context;
pub mod cors;
pub mod middleware;
pub mod pipeline;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use controlplane::audit::AuditSink;
use controlplane::auth::TokenVerifier;
use controlplane::config::{self, AppConfig, Environment};
use controlplane::observability::Metrics;
use controlplane::policy::PolicyEngine;
use controlplane::proxy::CoreProxy;
use controlplane::rate_limit::RateLimiter;
use controlplane::repository::{InMemoryTenantRepository, InMemoryUserRepository};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::middleware::permission::PermissionMap;
use crate::state::AppState;

/// CLI overrides applied on top of the loaded configuration.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub config_path: Option<String>,
    pub port: Option<u16>,
}

/// Loads configuration, installs tracing, builds the shared state, and
/// serves until a shutdown signal is received and the drain window elapses.
///
/// # Errors
/// Returns an error if configuration cannot be loaded, the audit log cannot
/// be opened, or the listener cannot be bound.
pub async fn run(overrides: CliOverrides) -> anyhow::Result<()> {
    let mut config = config::load(overrides.config_path.as_deref())?;
    if let Some(port) = overrides.port {
        config.port = port;
    }

    install_tracing(config.environment);
    if config.tracing_enabled() {
        tracing::warn!(
            endpoint = %config.tracing.endpoint,
            "TRACING_ENDPOINT is set but OTLP export is not wired into this build"
        );
    }

    let state = build_state(config)?;
    serve(state).await
}

fn install_tracing(environment: Environment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::fmt().with_env_filter(filter);
    if environment == Environment::Production {
        registry.json().init();
    } else {
        registry.pretty().init();
    }
}

/// Builds the shared application state from a loaded configuration: the
/// in-memory repositories (seeding the default tenant), the policy engine
/// (seeding the five default policies), and handles to every collaborator
/// the admission pipeline depends on.
///
/// # Errors
/// Returns an error if the configured audit log path cannot be opened.
pub fn build_state(config: AppConfig) -> anyhow::Result<Arc<AppState>> {
    let audit = if config.audit_enabled() {
        AuditSink::open(&config.audit_log_path)?
    } else {
        AuditSink::disabled()
    };

    let core_proxy = CoreProxy::new(config.core_proxy.service_url.clone(), config.core_proxy_timeout());
    let token_verifier = TokenVerifier::new(SecretString::from(config.jwt_secret.clone()));

    Ok(Arc::new(AppState {
        config: Arc::new(config),
        token_verifier: Arc::new(token_verifier),
        rate_limiter: RateLimiter::new(),
        policy_engine: Arc::new(PolicyEngine::seeded_with_defaults()),
        audit: Arc::new(audit),
        core_proxy: Arc::new(core_proxy),
        tenants: Arc::new(InMemoryTenantRepository::new()),
        users: Arc::new(InMemoryUserRepository::new()),
        metrics: Arc::new(Metrics::new()),
        permissions: PermissionMap::build(),
        started_at: Instant::now(),
    }))
}

async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], state.config.port).into();
    let grace = state.config.shutdown_grace();
    let router = pipeline::build_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "control plane listening");

    let shutdown = Arc::new(tokio::sync::Notify::new());

    // Enforces the bounded drain window: once a signal is observed, any
    // request still in flight after `grace` is abandoned by terminating the
    // process rather than left to hang indefinitely.
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown.notified().await;
            tokio::time::sleep(grace).await;
            tracing::warn!("graceful shutdown window elapsed, forcing exit");
            std::process::exit(0);
        }
    });

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(wait_for_signal(shutdown))
        .await?;
    Ok(())
}

async fn wait_for_signal(shutdown: Arc<tokio::sync::Notify>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(%err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => tracing::error!(%err, "failed to install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
    shutdown.notify_one();
}
