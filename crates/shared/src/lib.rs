//! Shared types, errors, and configuration for Fable.
//!
//! This crate contains the cross-cutting pieces used by every other crate:
//! - Application-wide error type with HTTP status mapping
//! - Configuration loading from files and environment

pub mod config;
pub mod error;

pub use config::{
    AppConfig, BackendSettings, DatabaseConfig, GcSettings, ProviderSettings, ServerConfig,
    StorageSettings,
};
pub use error::{AppError, AppResult};
