//! Error types for Patroni configuration rendering
//!
//! Resolution itself never fails: malformed overlays are normalized in place.
//! Errors only surface when a resolved tree is serialized or when the binary
//! reads its inputs.

use thiserror::Error;

/// Error variants are named with the `Error` suffix for clarity (e.g., `SerializationError`).
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Resource not found: {0}")]
    NotFound(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
