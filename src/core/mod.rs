//! Core module containing fundamental types for kpm-memtool
//!
//! This module provides the foundational building blocks used throughout
//! the crate, including address handling, primitive values, process handles,
//! scan results and error types.

pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    Address,
    FreezeEntry,
    MemoryError,
    MemoryResult,
    MemoryValue,
    PrimitiveType,
    ProcessHandle,
    ProcessId,
    ScanResult,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

// Platform verification at compile time
#[cfg(not(any(target_os = "linux", target_os = "android")))]
compile_error!("kpm-memtool only supports Linux and Android targets");
