//! Privileged memory channel
//!
//! Every read and write of target memory goes through a [`MemoryChannel`].
//! The production implementation is [`KpmChannel`], which talks to the KPM
//! kernel extension over a hijacked `prctl`. [`SimulatedMemory`] implements
//! the same contract against an in-process byte store for dry runs and tests.
//!
//! Channel I/O never returns `Err`: a failed transfer reports zero bytes and
//! leaves the errno in [`MemoryChannel::last_error`].

pub mod kpm;
pub mod protocol;
pub mod simulated;

pub use kpm::{KpmChannel, PrctlTransport, Transport};
pub use protocol::{KpmCommand, Opcode};
pub use simulated::SimulatedMemory;

use crate::core::types::{Address, MemoryValue, PrimitiveType, ProcessId};
use serde::{Deserialize, Serialize};

/// Read/write access to the memory of one bound target process
pub trait MemoryChannel: Send + Sync {
    /// Binds the channel to `pid`. Does not check the driver is present.
    fn bind(&self, pid: ProcessId) -> bool;

    /// Currently bound pid
    fn target(&self) -> Option<ProcessId>;

    /// Checks whether something is answering on the channel at all
    fn probe(&self) -> bool;

    /// Reads up to `buffer.len()` bytes, returning how many were read
    fn read_bytes(&self, address: Address, buffer: &mut [u8]) -> usize;

    /// Writes `data`, returning how many bytes were written
    fn write_bytes(&self, address: Address, data: &[u8]) -> usize;

    /// errno of the last failed transfer, 0 after a successful one
    fn last_error(&self) -> i32;

    /// Reads one value; a short read yields `None`
    fn read_value(&self, address: Address, value_type: PrimitiveType) -> Option<MemoryValue> {
        let mut storage = [0u8; 8];
        let buffer = &mut storage[..value_type.size()];
        if self.read_bytes(address, buffer) != buffer.len() {
            return None;
        }
        MemoryValue::from_bytes(buffer, value_type)
    }

    /// Writes one value; true only if every byte was written
    fn write_value(&self, address: Address, value: &MemoryValue) -> bool {
        let bytes = value.to_bytes();
        self.write_bytes(address, &bytes) == bytes.len()
    }

    /// Probes and packages the outcome for display
    fn status(&self) -> DriverStatus {
        let available = self.probe();
        DriverStatus {
            available,
            last_error: self.last_error(),
        }
    }
}

/// Result of a driver probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStatus {
    pub available: bool,
    pub last_error: i32,
}
