//! Alice Common - Shared types, utilities, and configuration for the Alice gateway client.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Configuration error type
//! - Logging setup
//! - Small string helpers used when logging conversation text

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{ClientConfig, Config, GatewayConfig, ObservabilityConfig, PrevRequestIdMode};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};

