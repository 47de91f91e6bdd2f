//! Path utilities for Mixpoint configuration files

use std::path::PathBuf;

/// Get the default configuration directory
///
/// Returns: `{config_dir}/mixpoint` (e.g. `~/.config/mixpoint` on Linux),
/// falling back to `./mixpoint` when the platform has no config dir.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mixpoint")
}

/// Get the default config file path
///
/// # Arguments
/// * `filename` - Config file name (e.g., "config.yaml")
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}
