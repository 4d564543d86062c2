//! Core type definitions for kpm-memtool
//!
//! This module contains all fundamental types used throughout the crate,
//! including address wrappers, primitive values, process handles, scan
//! results and error types.

mod address;
mod error;
mod process_info;
mod scan_result;
mod value;

// Re-export all public types
pub use address::Address;
pub use error::{MemoryError, MemoryResult};
pub use process_info::{ProcessHandle, ProcessInfo};
pub use scan_result::{FreezeEntry, ScanResult};
pub use value::{MemoryValue, Primitive, PrimitiveType};

// Common type aliases
pub type ProcessId = i32;
pub type Offset = i64;
