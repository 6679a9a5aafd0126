//!
//! Initializes tracing logs from the `[logging]` config section.
//!
//! Called before anything else happens so errors while loading the rest of
//! the data directory are logged too.
//!

use tracing_subscriber::EnvFilter;

use crate::data_directory::{ConfigToml, LoggingToml};

fn env_filter_from_config(config: &LoggingToml) -> EnvFilter {
    config.module_levels.iter().fold(
        EnvFilter::new("").add_directive(config.level.to_owned().into()),
        |filter, level| filter.add_directive(level.to_owned().into()),
    )
}

/// Initialize the tracing logger.
///
/// `env_filter` wins over the config file, `RUST_LOG` wins over the `[logging]` section.
/// Logging stays off when neither is set.
pub fn init_tracing_logs(config: &ConfigToml, env_filter: Option<&str>) -> anyhow::Result<()> {
    let filter = match (env_filter, &config.logging) {
        (Some(directives), _) => EnvFilter::try_new(directives)
            .map_err(|e| anyhow::anyhow!("invalid tracing filter {directives:?}: {e}"))?,
        (None, Some(logging)) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| env_filter_from_config(logging))
        }
        (None, None) => return Ok(()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
    Ok(())
}
