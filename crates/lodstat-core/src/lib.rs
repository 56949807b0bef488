//! Lodstat Core - Foundation crate for the Lodstat dissemination portal.
//!
//! This crate provides shared value types, error handling and configuration
//! management that the disclosure-control engine and the command line shell
//! depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared value types (`Scalar`, `DimensionKey`)
//!
//! # Example
//!
//! ```rust
//! use lodstat_core::{AppConfig, DimensionKey, Scalar};
//!
//! let config = AppConfig::default();
//! assert!((config.secret.default_threshold - 3.0).abs() < f64::EPSILON);
//!
//! let key = DimensionKey::from_scalars(&[Scalar::Text("Trento".into()), Scalar::Integer(2014)]);
//! assert_eq!(key.to_string(), "Trento,2014");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, ClassRange, LoggingConfig, SecretConfig};
pub use error::{ConfigError, ConfigResult, LodstatError, Result};
pub use types::{DimensionKey, Scalar};
