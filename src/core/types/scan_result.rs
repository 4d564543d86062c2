//! Scan result and freeze entry types

use super::{Address, MemoryResult, MemoryValue, PrimitiveType};
use serde::{Deserialize, Serialize};

/// One address matched by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub address: Address,
    pub value_type: PrimitiveType,
    /// Backing name of the region the match was found in, e.g. `[anon:libc_malloc]`
    pub region_name: String,
}

impl ScanResult {
    /// Creates a new scan result
    pub fn new(
        address: Address,
        value_type: PrimitiveType,
        region_name: impl Into<String>,
    ) -> Self {
        ScanResult {
            address,
            value_type,
            region_name: region_name.into(),
        }
    }
}

/// An address that the freeze loop keeps re-writing.
///
/// The value is stored as text and parsed again on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeEntry {
    pub address: Address,
    pub value_type: PrimitiveType,
    pub literal: String,
}

impl FreezeEntry {
    /// Creates an entry, rejecting literals that do not parse for `value_type`
    pub fn new(
        address: Address,
        literal: impl Into<String>,
        value_type: PrimitiveType,
    ) -> MemoryResult<Self> {
        let literal = literal.into();
        MemoryValue::parse(&literal, value_type)?;
        Ok(FreezeEntry {
            address,
            value_type,
            literal,
        })
    }

    /// Decodes the literal for a write
    pub fn value(&self) -> MemoryResult<MemoryValue> {
        MemoryValue::parse(&self.literal, self.value_type)
    }
}
