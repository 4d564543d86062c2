//! Typed memory reads over a [`MemoryChannel`]

use crate::channel::MemoryChannel;
use crate::core::types::{
    Address, MemoryError, MemoryResult, MemoryValue, Primitive, PrimitiveType,
};
use crate::sys::ErrorCode;

/// Reads typed values out of the bound target.
///
/// A transfer that returns fewer bytes than requested is an error; the
/// channel's last errno is carried in the message.
pub struct MemoryReader<'a> {
    channel: &'a dyn MemoryChannel,
}

impl<'a> MemoryReader<'a> {
    /// Create a new memory reader
    pub fn new(channel: &'a dyn MemoryChannel) -> Self {
        MemoryReader { channel }
    }

    /// Read raw bytes from memory
    pub fn read_bytes(&self, address: Address, size: usize) -> MemoryResult<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        let read = self.channel.read_bytes(address, &mut buffer);
        if read != size {
            return Err(self.short_read(address, size, read));
        }
        Ok(buffer)
    }

    /// Read a typed value from memory
    pub fn read<T: Primitive>(&self, address: Address) -> MemoryResult<T> {
        let size = T::TYPE.size();
        let bytes = self.read_bytes(address, size)?;
        T::from_le_slice(&bytes).ok_or_else(|| self.short_read(address, size, bytes.len()))
    }

    /// Read a value of a runtime-selected type
    pub fn read_value(
        &self,
        address: Address,
        value_type: PrimitiveType,
    ) -> MemoryResult<MemoryValue> {
        let bytes = self.read_bytes(address, value_type.size())?;
        MemoryValue::from_bytes(&bytes, value_type)
            .ok_or_else(|| self.short_read(address, value_type.size(), bytes.len()))
    }

    fn short_read(&self, address: Address, wanted: usize, got: usize) -> MemoryError {
        MemoryError::read_failed(
            address,
            format!(
                "read {} of {} bytes, {}",
                got,
                wanted,
                ErrorCode::from(self.channel.last_error())
            ),
        )
    }
}
