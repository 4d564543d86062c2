//! Request layout understood by the KPM extension

use crate::core::types::{Address, ProcessId};

/// Operation selector carried in [`KpmCommand::op`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Opcode {
    Read = 0,
    Write = 1,
}

/// One request, passed to the extension by pointer.
///
/// Layout must match the kernel side exactly.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KpmCommand {
    pub pid: i32,
    pub op: i32,
    pub addr: u64,
    pub len: u64,
    /// Caller buffer, as a user-space pointer
    pub data: u64,
}

impl KpmCommand {
    /// Read `buffer.len()` bytes at `address` into `buffer`
    pub fn read(pid: ProcessId, address: Address, buffer: &mut [u8]) -> Self {
        KpmCommand {
            pid,
            op: Opcode::Read as i32,
            addr: address.as_u64(),
            len: buffer.len() as u64,
            data: buffer.as_mut_ptr() as u64,
        }
    }

    /// Write `data` at `address`
    pub fn write(pid: ProcessId, address: Address, data: &[u8]) -> Self {
        KpmCommand {
            pid,
            op: Opcode::Write as i32,
            addr: address.as_u64(),
            len: data.len() as u64,
            data: data.as_ptr() as u64,
        }
    }

    pub fn opcode(&self) -> Option<Opcode> {
        match self.op {
            0 => Some(Opcode::Read),
            1 => Some(Opcode::Write),
            _ => None,
        }
    }
}
