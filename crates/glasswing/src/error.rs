//! Host error types.

use std::path::PathBuf;

use glasswing_core::BridgeError;
use thiserror::Error;

use crate::config::ConfigError;

/// Anything that ends the host.
#[derive(Debug, Error)]
pub enum HostError {
    /// Bad configuration or command line.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The module file could not be read.
    #[error("cannot read module {}: {source}", .path.display())]
    ReadModule {
        /// Module path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The module failed to compile, link or instantiate.
    #[error("cannot load module: {0}")]
    Module(String),

    /// A fatal bridge error while the module ran.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The window or event loop could not be created.
    #[error("windowing error: {0}")]
    Window(String),
}

impl From<winit::error::EventLoopError> for HostError {
    fn from(err: winit::error::EventLoopError) -> Self {
        Self::Window(err.to_string())
    }
}

impl From<winit::error::OsError> for HostError {
    fn from(err: winit::error::OsError) -> Self {
        Self::Window(err.to_string())
    }
}

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;
