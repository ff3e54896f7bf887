use crate::config::HostConfig;
use crate::server;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// CLI arguments forwarded from `main()`.
pub struct BootstrapArgs {
    pub config_path: std::path::PathBuf,
    pub listen: String,
    pub admin_listen: String,
}

/// Gateway lifecycle: init → load → serve → shutdown.
pub async fn run(args: BootstrapArgs) -> Result<()> {
    init_tracing();

    let config = HostConfig::load(&args.config_path)?;
    let state = server::HostState::new(config)?;

    let shutdown = Arc::new(Notify::new());

    start_admin_server(&state, &args);

    tracing::info!("server: starting gateway, listen={}", args.listen);

    let proxy_handle = tokio::spawn({
        let listen = args.listen.clone();
        let state = state.clone();
        let shutdown = shutdown.clone();
        async move { server::run_proxy_server(&listen, state, shutdown).await }
    });

    wait_for_shutdown(&shutdown).await;

    // Wait for the proxy to finish draining.
    match proxy_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("server: proxy error: {}", e),
        Err(e) => tracing::error!("server: proxy task error: {}", e),
    }

    tracing::info!("server: shutdown complete");
    Ok(())
}

fn init_tracing() {
    let (non_blocking, _guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .buffered_lines_limit(128_000)
        .lossy(true)
        .finish(std::io::stdout());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .json(),
        )
        .init();

    std::mem::forget(_guard);
}

fn start_admin_server(state: &server::HostState, args: &BootstrapArgs) {
    let state = state.clone();
    let admin_addr = args.admin_listen.clone();
    tokio::spawn(async move {
        if let Err(e) = server::run_admin_server(&admin_addr, state).await {
            tracing::error!("server: admin failed, error={}", e);
        }
    });
}

async fn wait_for_shutdown(shutdown: &Arc<Notify>) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("server: received SIGINT, shutting down"),
        _ = terminate => tracing::info!("server: received SIGTERM, shutting down"),
    }

    shutdown.notify_waiters();
}
