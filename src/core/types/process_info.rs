//! Process identity types

use super::{MemoryError, MemoryResult, ProcessId};
use serde::{Deserialize, Serialize};

/// A process found by the resolver: its pid and the first argument of its
/// command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub name: String,
}

impl ProcessInfo {
    pub fn new(pid: ProcessId, name: impl Into<String>) -> Self {
        ProcessInfo {
            pid,
            name: name.into(),
        }
    }
}

/// The currently targeted process.
///
/// Only a snapshot: pids are recycled, so callers re-resolve `name` before
/// anything long-running instead of trusting `pid` forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHandle {
    pid: ProcessId,
    name: String,
}

impl ProcessHandle {
    /// Creates a handle, rejecting non-positive pids
    pub fn new(pid: ProcessId, name: impl Into<String>) -> MemoryResult<Self> {
        if pid <= 0 {
            return Err(MemoryError::InvalidProcessId(pid));
        }
        Ok(ProcessHandle {
            pid,
            name: name.into(),
        })
    }

    /// Get the process ID
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Get the lookup name
    pub fn name(&self) -> &str {
        &self.name
    }
}
