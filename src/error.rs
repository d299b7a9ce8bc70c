//! Error handling for the threadpipe crate
//!
//! This module defines the custom error type and a Result alias used
//! throughout the crate.
//!
//! An empty pipe and a cancelled blocking pop are *not* errors; those
//! conditions are reported as `Ok(None)` by the pipe operations. Errors are
//! reserved for invalid arguments, operations incompatible with the current
//! binding state, and use of a pipe whose shared worker has shut down.

use thiserror::Error;

/// Main error type for pipe and container operations
#[derive(Error, Debug)]
pub enum PipeError {
    /// An argument was outside its valid range (e.g. a zero processor
    /// batch size)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is incompatible with the pipe's current binding state
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// The shared serialization queue has shut down
    #[error("Serialization queue is closed")]
    QueueClosed,
}

/// Result type alias for threadpipe operations
pub type Result<T> = std::result::Result<T, PipeError>;
