//! # Peerdex Configuration Library
//!
//! Typed configuration for a peerdex node. Every section derives serde with
//! `#[serde(default)]`, so a TOML file only needs to mention the values it
//! overrides.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use peerdex_config::NodeConfig;
//!
//! # fn main() -> Result<(), peerdex_config::ConfigError> {
//! let config = NodeConfig::load_from_file("peerdex.toml")?;
//! println!("observer runs every {}s", config.resources.interval_secs);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod components;
mod error;
mod loader;

pub use components::*;
pub use error::{ConfigError, ConfigResult};
pub use loader::NodeConfig;
