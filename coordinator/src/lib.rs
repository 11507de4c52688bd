//! Library entry of the hostplane coordinator.
//!
//! Exposes `inner_main` so the workspace-level binary can call into the coordinator, and
//! [`WsMessage`] so integration tests can decode what the notification socket sends.
#![cfg_attr(
    test,
    expect(clippy::indexing_slicing, reason = "This is not problematic in tests",)
)]

extern crate alloc;
extern crate core;

mod app;
pub mod cli;
pub mod config;
mod http;
mod integrations;
mod lifecycle;
mod notifications;
mod provisioner;
pub mod websocket;

#[cfg(unix)]
use nix::sys::stat;
use tracing::Instrument as _;
// for use in integration tests
pub use websocket::WsMessage;

use std::env;
use std::fs;
use std::process;
use std::sync::Once;

use eyre::{Result, WrapErr as _};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use cli::{Cli, Command, LogFormat};

static INIT_TRACING: Once = Once::new();
static INIT_RUSTLS: Once = Once::new();

/// The coordinator's main function; called from the shim binary.
///
/// # Errors
///
/// Returns an error if the config file is missing or invalid, or if the server fails to start.
pub async fn inner_main(invocation: Cli) -> Result<()> {
    match invocation.command {
        Command::ControlService(args) => {
            // The SQLite database and its journal files are owner-only.
            #[cfg(unix)]
            stat::umask(stat::Mode::S_IRWXU.complement());

            let config = &args.config;
            let config_path =
                fs::canonicalize(config).wrap_err(format!("Config file not found at: {config}"))?;

            INIT_TRACING.call_once(move || {
                let default_level = if env::var("HOSTPLANE_INTEGRATION_TEST").is_ok() {
                    "error"
                } else {
                    "info"
                };

                let builder = tracing_subscriber::fmt()
                    .with_env_filter(
                        EnvFilter::try_from_default_env()
                            .unwrap_or_else(|_| EnvFilter::new(default_level)),
                    )
                    .with_timer(ChronoLocal::rfc_3339());

                match args.log_format {
                    LogFormat::Compact => builder.compact().init(),
                    LogFormat::Json => builder.json().init(),
                    LogFormat::Pretty => builder.pretty().init(),
                }
            });

            let startup_span = tracing::info_span!(
                "coord.startup",
                ?config_path,
                pid = ?process::id(),
                version = env!("CARGO_PKG_VERSION")
            );
            let _startup_enter = startup_span.enter();

            INIT_RUSTLS.call_once(|| {
                if rustls_openssl::default_provider()
                    .install_default()
                    .is_err()
                {
                    warn!("A rustls crypto provider was already installed, keeping it");
                }
            });

            info!("Starting coordinator");

            app::start(&config_path, args.port, args.bind.as_deref())
                .in_current_span()
                .await?;
            Ok(())
        }
    }
}
