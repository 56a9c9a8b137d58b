//! Uploader Configuration Module
//!
//! Provides the upload pipeline configuration loaded from TOML files.
//!
//! ## Loading Order
//!
//! 1. `EVENT_LOGGING_CONFIG` environment variable (path to TOML file)
//! 2. `event_logging.toml` in the current working directory
//! 3. Built-in defaults
//!
//! `EVENT_LOGGING_PUBLIC_KEY` overrides `[encryption] public_key` in every case.
//!
//! ## Usage
//!
//! ```ignore
//! let config = EventLoggingConfig::load();
//! config.validate()?;
//! let key = config.public_key()?;
//! ```
//!
//! There is no global config: the orchestrator takes the config by value at
//! construction, and a bad public key fails there, before any upload starts.

mod uploader_config;
pub mod defaults;
pub mod validation;

pub use uploader_config::*;
