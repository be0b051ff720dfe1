//! Error types for the core pipeline.
//!
//! None of these ever escape a pipeline hook; they are logged and the flow
//! falls through to default proxy behavior.

use std::path::PathBuf;

use thiserror::Error;

/// Asset store error type.
#[derive(Debug, Error)]
pub enum AssetError {
    /// A resource name or asset file name cannot be used as a path component.
    #[error("invalid asset path component: {0:?}")]
    InvalidPath(String),

    /// The asset exists but could not be read.
    #[error("failed to read asset {path:?}: {source}")]
    Io {
        /// Path that was probed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Configuration loading error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
