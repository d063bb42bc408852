use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::Environment;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the default level when set.
pub fn init_logging(verbose: bool, env: Environment) -> Result<()> {
    let level = if verbose || env == Environment::Local {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
        // Filter out noisy dependencies
        .add_directive("reqwest=warn".parse()?)
        .add_directive("rusqlite=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("redis=warn".parse()?);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false);

    if env == Environment::Local {
        subscriber.pretty().try_init().map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;
    } else {
        subscriber.with_target(false).compact().try_init().map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;
    }

    Ok(())
}
