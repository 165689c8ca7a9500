//! Configuration module for Price-Scout
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use price_scout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("price-scout.toml")).unwrap();
//! println!("Probing at most {} combinations", config.prober.combination_cap);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BatchConfig, Config, CredentialSection, CredentialsConfig, OutputConfig, ProberConfig,
    VendorConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
