//! Configuration models for the daemon and its mirror tasks.

pub mod general;
pub mod mirror;

pub use general::GeneralConfig;
pub use mirror::{MirrorConfig, TaskOptions, GENERAL_SECTION};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "MIRRORD_CONFIG";

/// Configuration path used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "mirror.json";

/// Resolve the configuration path from the environment.
pub fn config_path() -> String {
    std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned())
}
