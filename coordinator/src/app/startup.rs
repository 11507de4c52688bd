use alloc::string;
use core::net::{IpAddr, SocketAddr};
use std::path::Path;

use eyre::WrapErr as _;
use tokio::{net, signal};

use crate::{
    app::state::{self, AppState},
    http::server::router,
};

/// Creates a future that resolves when a shutdown signal is received.
pub(crate) async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => drop(sigterm.recv().await),
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler, falling back to Ctrl-C: {e}");
                drop(signal::ctrl_c().await);
            }
        }
    }
    #[cfg(not(unix))]
    {
        drop(signal::ctrl_c().await);
    }
}

/// Serve the HTTP API until a shutdown signal arrives.
async fn start_server(app_state: AppState, addr: SocketAddr) -> eyre::Result<()> {
    let app = router::create_app(app_state);

    tracing::info!("Listening on http://{}", addr);
    let listener = net::TcpListener::bind(addr)
        .await
        .wrap_err(format!("Failed to bind {addr}"))?;
    let server = axum::serve(listener, app);
    tokio::select! {
        res = server => res?,
        () = shutdown_signal() => {
            tracing::info!("Received shutdown, shutting down");
        }
    }

    Ok(())
}

/// # Returns
///
/// `Ok(())` when the server runs until termination, or an error if binding or setup fails.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, a backing client cannot be
/// constructed, or the server cannot bind.
pub(crate) async fn start(
    config_path: &Path,
    port_override: Option<u16>,
    bind_override: Option<&str>,
) -> eyre::Result<()> {
    tracing::info!("Starting HTTP server...");

    let app_state = state::initialize_state(config_path).await?;

    // Apply optional overrides from CLI/tests
    let listen_port = port_override.unwrap_or(app_state.config.server.port);
    let bind_str = bind_override.map_or_else(
        || app_state.config.server.bind.clone(),
        string::ToString::to_string,
    );

    let listen_ip: IpAddr = bind_str
        .parse()
        .wrap_err(format!("Invalid bind address: {bind_str}"))?;

    start_server(app_state, SocketAddr::from((listen_ip, listen_port))).await
}
