//! kpm-memtool library: memory scanning and freezing for Android/Linux
//! processes through the KPM `prctl` channel

pub mod channel;
pub mod config;
pub mod core;
pub mod memory;
pub mod process;
pub mod sys;

// Re-export main types from core module
pub use crate::core::types::{
    Address, FreezeEntry, MemoryError, MemoryResult, MemoryValue, Offset, PrimitiveType,
    ProcessHandle, ProcessId, ProcessInfo, ScanResult,
};

pub use channel::{DriverStatus, KpmChannel, MemoryChannel, SimulatedMemory};
pub use memory::{MemoryRegion, MemoryTool, RegionCategory};
pub use process::ProcessResolver;

// Re-export core directly for full access
pub use crate::core::*;
