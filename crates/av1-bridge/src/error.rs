//! Error types for the bridge crate.

use thiserror::Error;

/// Bridge error type
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Invalid or conflicting configuration, detected before any guest
    /// interaction
    #[error("configuration error: {0}")]
    Config(String),

    /// Module compilation, linking or instantiation failed
    #[error("instantiation failed: {0}")]
    Instantiate(String),

    /// Guest initialization entry point returned the zero sentinel
    #[error("guest decoder initialization failed")]
    Init,

    /// Guest returned the zero sentinel for an allocation request
    #[error("guest allocation failed: {0}")]
    GuestAlloc(&'static str),

    /// Guest decode entry point returned the zero sentinel
    #[error("guest decode failed")]
    Decode,

    /// Guest exercised a capability the bridge refuses to provide
    /// (memory growth, syscalls, abort)
    #[error("unsupported guest capability: {0}")]
    Unsupported(&'static str),

    /// Guest call trapped for any other reason
    #[error("guest call failed: {0}")]
    GuestCall(String),

    /// Host-side access outside the linear memory bounds
    #[error("guest memory access out of bounds: offset {offset}, len {len}")]
    MemoryAccess {
        /// Requested offset into linear memory
        offset: u32,
        /// Requested length in bytes
        len: u32,
    },

    /// Encoded unit does not fit a 32-bit guest length
    #[error("encoded unit too large: {0} bytes")]
    UnitTooLarge(usize),

    /// IO error while reading a module from disk
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
