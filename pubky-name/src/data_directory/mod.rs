//!
//! Everything pubky-name keeps on disk: the config file, the node identity,
//! the keystore and the records published while offline.
//!

mod config_toml;
mod data_dir;
mod log_level;
mod toml_merge;

pub use config_toml::{
    ConfigReadError, ConfigToml, ContentToml, GeneralToml, LoggingToml, PkdnsToml,
    DEFAULT_CONFIG, SAMPLE_CONFIG,
};
pub use data_dir::DataDir;
pub use log_level::{LogLevel, TargetLevel};
