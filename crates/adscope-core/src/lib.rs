//! Adscope Core - Foundation crate for the advertisement measurement pipeline.
//!
//! This crate provides the shared error types, configuration management and
//! identifier newtypes that the matching and measurement crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared newtypes (`PageId`, `SurveyUserId`, `Timestamp`)
//!
//! # Example
//!
//! ```rust
//! use adscope_core::{AppConfig, PageId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert!(!config.measurement.development_mode);
//!
//! let page_id = PageId::new("visit-42");
//! assert_eq!(page_id.as_str(), "visit-42");
//! # Ok(())
//! # }
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
pub use config::{AppConfig, MeasurementConfig, SurveyConfig, TelemetryConfig};
pub use error::{AdscopeError, ConfigError, ConfigResult, Result};
pub use types::{PageId, SurveyUserId, Timestamp, DEFAULT_NAMESPACE};
