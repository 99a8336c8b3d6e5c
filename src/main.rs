use clap::Parser;
use ipmi_dhcpd::{Args, ServerConfig, ServerError};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut config = ServerConfig::load(&args.config).await?;
    if args.interface.is_some() {
        config.interface = args.interface;
    }

    info!("Starting DHCP server with config {}", args.config.display());

    tokio::select! {
        result = ipmi_dhcpd::run(config) => match result? {},
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, stopping server...");
            Ok(())
        }
    }
}
