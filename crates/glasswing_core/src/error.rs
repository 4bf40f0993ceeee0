//! # Bridge Error Types
//!
//! Every error in this enum is fatal once it reaches the driver: the session
//! stops rendering and the message is surfaced to the user. Recoverable
//! anomalies travel over the diagnostics channel instead.

use thiserror::Error;

/// Errors raised while bridging the host and the module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A memory view was requested past the end of module memory.
    #[error("memory view out of bounds: {len} bytes at {addr:#x}, memory is {memory_len} bytes")]
    OutOfBounds {
        /// Start address of the requested view.
        addr: u32,
        /// Requested length in bytes.
        len: u32,
        /// Current size of module memory.
        memory_len: usize,
    },

    /// A typed view was requested at an address not aligned for its element.
    #[error("misaligned {element}-byte view at {addr:#x}")]
    Misaligned {
        /// Start address of the requested view.
        addr: u32,
        /// Element size in bytes.
        element: usize,
    },

    /// The vertex stride/offsets cannot describe a valid vertex record.
    #[error("invalid vertex layout: {0}")]
    InvalidVertexLayout(String),

    /// Texture creation was asked for an impossible size.
    #[error("invalid texture {width}x{height}: {reason}")]
    InvalidTexture {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Every texture handle of the session has been issued.
    #[error("texture handles exhausted")]
    HandlesExhausted,

    /// The module signalled an unrecoverable internal fault.
    #[error("module panic: {0}")]
    ModulePanic(String),

    /// The module does not export a symbol the host needs.
    #[error("module is missing export `{0}`")]
    MissingExport(&'static str),

    /// A call into the module trapped.
    #[error("module trapped in `{export}`: {message}")]
    Trap {
        /// Export being called.
        export: &'static str,
        /// Runtime message.
        message: String,
    },

    /// Shader compilation or pipeline creation failed.
    #[error("graphics pipeline setup failed: {0}")]
    PipelineSetup(String),

    /// The presentation surface could not be created or acquired.
    #[error("surface error: {0}")]
    Surface(String),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
