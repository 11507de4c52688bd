//! Command-line interface of the coordinator binary.

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level command-line interface definition.
#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands for the coordinator.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the control plane HTTP API and notification socket.
    ControlService(ServiceArgs),
}

/// Output format of the log lines written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
    Pretty,
}

/// Arguments for the control service command.
#[derive(Debug, Parser)]
pub struct ServiceArgs {
    /// Path to the configuration file
    #[arg(
        short,
        long,
        env = "HOSTPLANE_CONFIG_PATH",
        default_value = "hostplane.toml"
    )]
    pub config: String,

    /// Optional override for the listen port (overrides port in config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Optional override for the bind address (overrides bind in config)
    #[arg(long)]
    pub bind: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_service_overrides_parse() {
        let cli = Cli::try_parse_from([
            "coordinator",
            "control-service",
            "--config",
            "/etc/hostplane.toml",
            "--port",
            "9090",
            "--log-format",
            "json",
        ])
        .unwrap();
        let Command::ControlService(args) = cli.command;
        assert_eq!(args.config, "/etc/hostplane.toml");
        assert_eq!(args.port, Some(9090));
        assert_eq!(args.bind, None);
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
