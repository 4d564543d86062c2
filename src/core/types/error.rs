//! Custom error types for kpm-memtool

use std::fmt;
use thiserror::Error;

/// Main error type for memory operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Invalid memory address: {0}")]
    InvalidAddress(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Not connected to a target process")]
    NotConnected,

    #[error("Invalid process id: {0}")]
    InvalidProcessId(i32),

    #[error("Failed to read memory at {address}: {reason}")]
    ReadFailed { address: String, reason: String },

    #[error("Failed to write memory at {address}: {reason}")]
    WriteFailed { address: String, reason: String },

    #[error("Invalid value '{value}' for type {value_type}")]
    InvalidValue { value: String, value_type: String },

    #[error("Invalid value type: {0}")]
    InvalidValueType(String),

    #[error("Invalid region category: {0}")]
    InvalidCategory(String),

    #[error("Malformed map line: {0}")]
    MalformedMapLine(String),

    #[error("KPM channel unavailable (errno {0})")]
    ChannelUnavailable(i32),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

impl MemoryError {
    /// Creates a read failed error
    pub fn read_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::ReadFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a write failed error
    pub fn write_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::WriteFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid value error
    pub fn invalid_value(value: impl Into<String>, value_type: impl fmt::Display) -> Self {
        MemoryError::InvalidValue {
            value: value.into(),
            value_type: value_type.to_string(),
        }
    }
}
