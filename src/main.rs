//! glb2step server: converts uploaded GLB models into zipped STEP files
//!
//! Main entry point that loads configuration, prepares the storage root and
//! starts the HTTP server.

use std::future::IntoFuture;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use glb2step_api::AppState;
use glb2step_core::config::AppConfig;
use glb2step_core::error::AppError;
use glb2step_core::result::AppResult;
use glb2step_pipeline::{ConversionError, JobWorkspace, StageRunner};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/` and the environment
fn load_configuration() -> AppResult<AppConfig> {
    let env = std::env::var("GLB2STEP_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> AppResult<()> {
    tracing::info!("Starting glb2step v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Storage root ─────────────────────────────────────
    prepare_storage(&config).await?;

    // ── Step 2: External tools ───────────────────────────────────
    for program in [
        &config.conversion.converter_command,
        &config.conversion.cad_command,
    ] {
        if StageRunner::is_available(program) {
            tracing::info!(program = %program, "External tool found");
        } else {
            tracing::warn!(
                program = %program,
                "External tool not found on PATH, conversions will fail until it is installed"
            );
        }
    }

    // ── Step 3: Build and start HTTP server ──────────────────────
    let addr = config.server.bind_addr();
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);

    let app = glb2step_api::build_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("glb2step server listening on {}", addr);

    // ── Step 4: Graceful shutdown ────────────────────────────────
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    let grace_elapsed = async move {
        let _ = shutdown_rx.wait_for(|stopping| *stopping).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server.into_future() => {
            result.map_err(|e| AppError::internal(format!("Server error: {}", e)))?;
        }
        _ = grace_elapsed => {
            tracing::warn!(
                grace_seconds = grace.as_secs(),
                "Grace period elapsed, abandoning in-flight conversions"
            );
        }
    }

    tracing::info!("glb2step server shut down");
    Ok(())
}

/// Create the storage root and clear job directories left by a previous run
async fn prepare_storage(config: &AppConfig) -> AppResult<()> {
    let workspace = JobWorkspace::new(config.storage.root.clone(), config.storage.retain_jobs);

    workspace
        .ensure_root()
        .await
        .map_err(|e| ConversionError::from(e).into_app_error(true))?;

    if config.storage.retain_jobs {
        tracing::info!("Job retention enabled, skipping stale job sweep");
        return Ok(());
    }

    let max_age = Duration::from_secs(config.storage.stale_job_minutes * 60);
    let removed = workspace
        .sweep_stale(max_age)
        .await
        .map_err(|e| ConversionError::from(e).into_app_error(true))?;

    tracing::info!(
        root = %workspace.root().display(),
        removed,
        "Storage root ready"
    );

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}
