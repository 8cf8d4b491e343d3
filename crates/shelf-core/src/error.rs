//! Error types for shelf-core
//!
//! Each module owns its error enum (`VersionError`, `StoreError`,
//! `TranslatorError`, `AuditError`, `LifecycleError`); this module holds the
//! configuration errors shared by the loader and its callers.

use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found")]
    NotFound,
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
