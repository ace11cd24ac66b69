use tracing::{error, info};

use prism_daemon::{config, server, state};

const DEFAULT_LOG_DIRECTIVE: &str = "prism_daemon=info,tower_http=info";

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "configuration invalid, aborting");
            std::process::exit(1);
        }
    };

    info!(
        project_root = %config.project_root.display(),
        port = config.port,
        enable_watcher = config.enable_watcher,
        "prism-daemon starting"
    );

    let state = state::AppState::new(config);

    match state.indexer.load().await {
        Ok(()) => info!("loaded existing snapshot"),
        Err(e) => {
            info!(reason = %e, "no usable snapshot, running full build");
            if let Err(e) = state.indexer.build_full().await {
                error!(error = %e, "initial index build failed");
                std::process::exit(1);
            }
        }
    }

    if state.config.enable_watcher {
        state.watcher.enable();
    }

    let addr = state.config.listen_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %addr, error = %e, "failed to bind listener");
            std::process::exit(1);
        }
    };
    info!(addr = %addr, "listening");

    let shutdown_timeout = std::time::Duration::from_millis(state.config.shutdown_timeout_ms);
    let app = server::create_app(state.clone());

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_timeout));

    if let Err(e) = server.await {
        error!(error = %e, "server exited with error");
    }

    info!("shutdown complete");
}

fn init_tracing() {
    let directive = std::env::var("LOG_LEVEL")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_DIRECTIVE.to_string());
    let filter = tracing_subscriber::EnvFilter::try_new(&directive)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_DIRECTIVE));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();
}

/// Resolves once the first SIGINT/SIGTERM arrives, which is what triggers
/// `axum::serve`'s graceful drain. A background task then bounds that drain
/// to `shutdown_timeout` and force-exits on a second signal, since
/// `with_graceful_shutdown` itself has no timeout of its own.
async fn shutdown_signal(shutdown_timeout: std::time::Duration) {
    wait_for_signal().await;
    info!(?shutdown_timeout, "shutdown signal received, draining in-flight requests");

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(shutdown_timeout) => {
                error!("shutdown timeout elapsed, forcing exit");
                std::process::exit(0);
            }
            _ = wait_for_signal() => {
                error!("second shutdown signal received, forcing exit");
                std::process::exit(130);
            }
        }
    });
}

async fn wait_for_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
