//! Mapping permissions as printed in the memory map

use crate::core::types::MemoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four-character permission column of a map line, e.g. `rw-p`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
    /// `s` (shared) rather than `p` (private, copy-on-write)
    pub shared: bool,
}

impl Permissions {
    /// Read-write private mapping
    pub const fn read_write() -> Self {
        Permissions {
            read: true,
            write: true,
            execute: false,
            shared: false,
        }
    }

    /// Read-only private mapping
    pub const fn read_only() -> Self {
        Permissions {
            read: true,
            write: false,
            execute: false,
            shared: false,
        }
    }

    /// Whether the column starts with `rw`, the only mappings worth scanning
    pub const fn is_read_write(&self) -> bool {
        self.read && self.write
    }
}

impl FromStr for Permissions {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let flag = |index: usize, set: u8| match bytes.get(index) {
            Some(&b) if b == set => Ok(true),
            Some(&b'-') => Ok(false),
            _ => Err(MemoryError::MalformedMapLine(format!("bad permissions '{}'", s))),
        };

        if bytes.len() != 4 {
            return Err(MemoryError::MalformedMapLine(format!("bad permissions '{}'", s)));
        }

        let shared = match bytes[3] {
            b's' => true,
            b'p' => false,
            _ => return Err(MemoryError::MalformedMapLine(format!("bad permissions '{}'", s))),
        };

        Ok(Permissions {
            read: flag(0, b'r')?,
            write: flag(1, b'w')?,
            execute: flag(2, b'x')?,
            shared,
        })
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pick = |on: bool, c: char| if on { c } else { '-' };
        write!(
            f,
            "{}{}{}{}",
            pick(self.read, 'r'),
            pick(self.write, 'w'),
            pick(self.execute, 'x'),
            if self.shared { 's' } else { 'p' }
        )
    }
}
