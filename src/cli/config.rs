use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::Config as AppConfig;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration (file, .env and environment merged)
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration to the config file
    Reset,
}

pub async fn execute(args: ConfigArgs, config: &AppConfig) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            println!("{}", config.to_display_toml()?);
        }

        ConfigCommands::Path => {
            let config_path = AppConfig::config_path()?;
            println!("{}", config_path.display());
        }

        ConfigCommands::Reset => {
            let config_path = AppConfig::config_path()?;
            AppConfig::default().save(&config_path)?;
            println!("Configuration reset to defaults");
            println!("Config file: {}", config_path.display());
        }
    }

    Ok(())
}
