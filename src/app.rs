use axum::Router;
use std::{panic, process, sync::Arc};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::error::AppError;
use crate::middleware::{
    self,
    auth::{ANONYMOUS, AuthFilter, AuthFilterConfig},
};
use crate::services::auth::build_token_services;
use crate::services::login::LoginService;
use crate::services::user_client::UserServiceClient;
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,nexus_gateway=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing; stderr may be hidden.
        tracing::error!(?info, "panic");

        // Development: crash the whole process so we notice immediately.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<(), AppError> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    // Key material and clients are built before binding: a misconfigured
    // process never accepts a request.
    let state = build_state(&config)?;
    let app = build_router(state, &config);

    info!(
        "starting gateway in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %config.addr, "failed to bind");
            AppError::Internal
        })?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = %e, "server error");
            AppError::Internal
        })?;

    info!("gateway stopped");
    Ok(())
}

pub fn build_state(config: &Config) -> Result<AppState, AppError> {
    let (validator, issuer) = build_token_services(config)?;

    let user_service =
        UserServiceClient::new(config.user_service_uri.clone(), config.user_service_timeout)
            .map_err(|e| {
                error!(error = %e, kind = "StartupMisconfiguration", "failed to build user service client");
                AppError::Internal
            })?;

    let login = LoginService::new(Arc::new(user_service), issuer);

    Ok(AppState::new(validator, login, config.exempt_paths.clone()))
}

/// Layer order, outermost first:
/// cors_sanitizer → cors → http → auth → routes.
/// Login is merged in beside the auth layer and never passes through it.
pub fn build_router(state: AppState, config: &Config) -> Router {
    if !config.auth_filter_enabled {
        warn!("auth filter disabled: every request is forwarded as {}", ANONYMOUS);
    }
    let filter = AuthFilter::from_state(&state).with_config(AuthFilterConfig {
        enabled: config.auth_filter_enabled,
    });

    let router = middleware::auth::apply(api::routes(), filter)
        .merge(api::public_routes())
        .with_state(state);
    let router = middleware::http::apply(router, config.request_timeout);
    let router = middleware::cors::apply(router, &config.cors_allowed_origins);
    middleware::cors_sanitizer::apply(router)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
