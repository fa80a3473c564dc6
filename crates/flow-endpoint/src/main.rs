//! `flow-endpoint` binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise tracing (JSON logs, optional OTLP export).
//! 3. Parse the private key into a [`FlowCodec`]; fail fast if it is unusable.
//! 4. Build the Axum router and serve until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};

use flow_endpoint::server::{router, state::AppState};
use flow_endpoint::{telemetry, Config, FlowCodec};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;

    // -----------------------------------------------------------------------
    // 3. Codec
    // -----------------------------------------------------------------------
    let options = cfg.codec_options()?;
    let codec = FlowCodec::from_pem(&cfg.private_key_pem, options).map_err(|e| {
        error!(code = e.code(), "private key unusable");
        anyhow::Error::new(e)
    })?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.port,
        framing = options.framing.as_str(),
        iv_policy = ?options.iv_policy,
        plaintext_fallback = options.allow_plaintext_fallback,
        self_check = options.self_check,
        "flow-endpoint starting"
    );
    if options.allow_plaintext_fallback {
        tracing::warn!("plaintext fallback enabled: unencrypted bodies bypass authentication");
    }

    // -----------------------------------------------------------------------
    // 4. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(codec, cfg.success_screen.clone());
    let app = router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Completes when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
