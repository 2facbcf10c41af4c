use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pulse-finance", version, about = "Freelancer finance analytics API")]
struct Cli {
    /// Log level used when RUST_LOG is not set.
    #[arg(long, env = "PULSE_LOG", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the JSON API over HTTP.
    Serve {
        #[arg(long, env = "PULSE_PORT", default_value_t = 8080)]
        port: u16,
        #[arg(long, env = "PULSE_BIND", default_value = "0.0.0.0")]
        bind: IpAddr,
    },
}

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Command::Serve { port, bind } => {
            let addr = SocketAddr::new(bind, port);
            pulse_finance::api::run_http_server(addr)
                .await
                .with_context(|| format!("HTTP server on {addr} failed"))?;
        }
    }
    Ok(())
}
