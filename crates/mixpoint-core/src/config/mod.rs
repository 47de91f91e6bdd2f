//! Configuration for the mixing core
//!
//! This module provides:
//!
//! - Generic YAML config loading/saving
//! - Default config path resolution
//! - The core settings (`MixpointConfig`)
//!
//! # Usage
//!
//! ```ignore
//! use mixpoint_core::config::{load_config, save_config, default_config_path, MixpointConfig};
//!
//! let path = default_config_path("config.yaml");
//! let mut config: MixpointConfig = load_config(&path);
//! config.validate();
//!
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;
mod settings;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use settings::{AnalysisConfig, CacheConfig, MixpointConfig, PlaybackConfig, SeparationConfig};
