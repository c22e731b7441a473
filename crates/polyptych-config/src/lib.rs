//! Configuration for polyptych.
//!
//! Render and unwrap settings persist to disk as `config.ron` and can be
//! overridden from the command line. Unknown and missing fields are tolerated
//! so older or newer config files keep loading.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, OutputFormat, RenderConfig, UnwrapConfig, default_config_dir};
pub use error::ConfigError;
