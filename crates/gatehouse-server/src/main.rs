//! Gatehouse server binary
//!
//! Multi-tenant SFTP gateway over local disk or object storage.
//!
//! ## Usage
//!
//! ```bash
//! gatehouse-server --config /etc/gatehouse/gatehouse.toml
//! gatehouse-server --config gatehouse.toml --port 2222
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use gatehouse_server::{Gateway, ServerConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "gatehouse.toml";

fn print_usage() {
    eprintln!(
        r#"gatehouse-server - multi-tenant SFTP gateway

USAGE:
    gatehouse-server [OPTIONS]

OPTIONS:
    --config <FILE>               Config file (default: {config})
    --port <PORT>                 Override the configured listener port
    --help, -h                    Show this help

EXAMPLES:
    gatehouse-server                               # {config} in the working directory
    gatehouse-server --config /etc/gatehouse.toml
    gatehouse-server --config gatehouse.toml --port 2222
"#,
        config = DEFAULT_CONFIG_PATH
    );
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut port_override: Option<u16> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            "--config" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("--config requires a value");
                    return ExitCode::FAILURE;
                };
                config_path = shellexpand::tilde(value).as_ref().into();
                i += 2;
            }
            "--port" => {
                let Some(port) = args.get(i + 1).and_then(|s| s.parse().ok()) else {
                    eprintln!("--port requires a port number");
                    return ExitCode::FAILURE;
                };
                port_override = Some(port);
                i += 2;
            }
            other => {
                eprintln!("Unknown option: {other}");
                print_usage();
                return ExitCode::FAILURE;
            }
        }
    }

    let mut config = match ServerConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = port_override {
        config.port = port;
    }

    tracing::info!(config = %config_path.display(), port = config.port, "starting gatehouse");

    let gateway = match Gateway::build(config).await {
        Ok(gateway) => gateway,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = gateway.run().await {
        tracing::error!("server error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
