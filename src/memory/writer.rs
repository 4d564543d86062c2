//! Typed memory writes over a [`MemoryChannel`]

use crate::channel::MemoryChannel;
use crate::core::types::{Address, MemoryError, MemoryResult, MemoryValue, Primitive};
use crate::sys::ErrorCode;
use tracing::debug;

/// Memory writer for type-safe write operations
pub struct MemoryWriter<'a> {
    channel: &'a dyn MemoryChannel,
}

impl<'a> MemoryWriter<'a> {
    /// Create a new memory writer
    pub fn new(channel: &'a dyn MemoryChannel) -> Self {
        MemoryWriter { channel }
    }

    /// Write raw bytes to memory
    pub fn write_bytes(&self, address: Address, data: &[u8]) -> MemoryResult<()> {
        let written = self.channel.write_bytes(address, data);
        if written != data.len() {
            return Err(MemoryError::write_failed(
                address,
                format!(
                    "wrote {} of {} bytes, {}",
                    written,
                    data.len(),
                    ErrorCode::from(self.channel.last_error())
                ),
            ));
        }
        Ok(())
    }

    /// Write a typed value to memory
    pub fn write<T: Primitive>(&self, address: Address, value: T) -> MemoryResult<()> {
        self.write_bytes(address, &value.to_le_vec())
    }

    /// Write a MemoryValue to memory
    pub fn write_value(&self, address: Address, value: &MemoryValue) -> MemoryResult<()> {
        self.write_bytes(address, &value.to_bytes())
    }

    /// Writes `value` to every address independently.
    ///
    /// Failures are logged and skipped; returns how many writes landed.
    pub fn write_batch<I>(&self, addresses: I, value: &MemoryValue) -> usize
    where
        I: IntoIterator<Item = Address>,
    {
        let bytes = value.to_bytes();
        addresses
            .into_iter()
            .filter(|&address| match self.write_bytes(address, &bytes) {
                Ok(()) => true,
                Err(e) => {
                    debug!(error = %e, "Batch write skipped address");
                    false
                }
            })
            .count()
    }
}
