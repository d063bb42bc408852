use clap::{Parser, Subcommand};
use std::sync::Arc;

use lyrics_library::cli::{config as config_cmd, serve, track};
use lyrics_library::config::Config;
use lyrics_library::error::Result;
use lyrics_library::services::ServiceFactory;
use lyrics_library::utils::logging::init_logging;

#[derive(Parser)]
#[command(name = "lyrics-library")]
#[command(about = "Fetch, translate and store song lyrics, served over HTTP")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file path (optional)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve(serve::ServeArgs),

    /// Fetch, translate and store the lyrics of a song
    Save(track::SaveArgs),

    /// Show a stored track, or every track of an artist
    Get(track::GetArgs),

    /// Delete a stored track by uuid
    Delete(track::DeleteArgs),

    /// Show configuration
    Config(config_cmd::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    init_logging(cli.verbose, config.env)?;

    let factory = ServiceFactory::new(Arc::new(config));

    match cli.command {
        Commands::Serve(args) => serve::execute(args, &factory).await?,
        Commands::Save(args) => track::save(args, &factory).await?,
        Commands::Get(args) => track::get(args, &factory).await?,
        Commands::Delete(args) => track::delete(args, &factory).await?,
        Commands::Config(args) => config_cmd::execute(args, &factory.config()).await?,
    }

    Ok(())
}
