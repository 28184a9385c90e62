#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{AuditArgs, BundleCommand, CliConfig, Command};
pub use toml_config::{AuditConfig, DEFAULT_CONFIG_PATH};
