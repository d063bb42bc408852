use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::config::validation::ConfigValidator;
use crate::server;
use crate::services::ServiceFactory;

#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind, overrides `server_address`
    #[arg(short, long, value_name = "HOST:PORT")]
    address: Option<String>,
}

pub async fn execute(args: ServeArgs, factory: &ServiceFactory) -> Result<()> {
    let mut config = (*factory.config()).clone();
    if let Some(address) = args.address {
        ConfigValidator::validate_socket_address(&address, "address")?;
        config.server_address = address;
    }

    let service = factory.create_track_service().await?;

    info!(
        env = ?config.env,
        provider = ?config.lyrics_provider,
        translator = ?config.translator,
        "Starting lyrics-library server"
    );
    server::run(&config, service).await?;

    info!("Shutdown complete");
    Ok(())
}
