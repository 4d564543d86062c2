//! Primitive value types scanned and written in target memory

use super::error::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of value types the tool can scan for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrimitiveType {
    Dword,
    Float,
    Double,
    Word,
    Byte,
    Qword,
}

impl PrimitiveType {
    /// All types, in selector order
    pub const ALL: [PrimitiveType; 6] = [
        PrimitiveType::Dword,
        PrimitiveType::Float,
        PrimitiveType::Double,
        PrimitiveType::Word,
        PrimitiveType::Byte,
        PrimitiveType::Qword,
    ];

    /// Returns the size in bytes for this type
    pub const fn size(&self) -> usize {
        match self {
            PrimitiveType::Byte => 1,
            PrimitiveType::Word => 2,
            PrimitiveType::Dword | PrimitiveType::Float => 4,
            PrimitiveType::Qword | PrimitiveType::Double => 8,
        }
    }

    /// Scan stride: the natural width capped at 4 bytes.
    ///
    /// 64-bit values are frequently only 4-byte aligned on the target ABI,
    /// so an 8-byte stride would miss them.
    pub const fn alignment(&self) -> usize {
        let size = self.size();
        if size > 4 {
            4
        } else {
            size
        }
    }

    /// Looks a type up by its selector index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Short display name
    pub const fn name(&self) -> &'static str {
        match self {
            PrimitiveType::Dword => "DWORD",
            PrimitiveType::Float => "FLOAT",
            PrimitiveType::Double => "DOUBLE",
            PrimitiveType::Word => "WORD",
            PrimitiveType::Byte => "BYTE",
            PrimitiveType::Qword => "QWORD",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PrimitiveType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dword" | "i32" | "int" => Ok(PrimitiveType::Dword),
            "float" | "f32" => Ok(PrimitiveType::Float),
            "double" | "f64" => Ok(PrimitiveType::Double),
            "word" | "i16" | "short" => Ok(PrimitiveType::Word),
            "byte" | "i8" => Ok(PrimitiveType::Byte),
            "qword" | "i64" | "long" => Ok(PrimitiveType::Qword),
            _ => Err(MemoryError::InvalidValueType(s.to_string())),
        }
    }
}

/// A decoded value of one of the primitive types
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum MemoryValue {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl MemoryValue {
    /// Parses user input for the given type.
    ///
    /// Integers are decimal and truncated to the type width (`"300"` as BYTE
    /// becomes `44`), floats are decimal.
    pub fn parse(text: &str, value_type: PrimitiveType) -> MemoryResult<Self> {
        let trimmed = text.trim();
        let invalid = || MemoryError::invalid_value(text, value_type);

        let value = match value_type {
            PrimitiveType::Float => MemoryValue::F32(trimmed.parse().map_err(|_| invalid())?),
            PrimitiveType::Double => MemoryValue::F64(trimmed.parse().map_err(|_| invalid())?),
            integer => {
                let wide: i64 = trimmed.parse().map_err(|_| invalid())?;
                match integer {
                    PrimitiveType::Byte => MemoryValue::I8(wide as i8),
                    PrimitiveType::Word => MemoryValue::I16(wide as i16),
                    PrimitiveType::Dword => MemoryValue::I32(wide as i32),
                    _ => MemoryValue::I64(wide),
                }
            }
        };

        Ok(value)
    }

    /// Returns the size in bytes of the value
    pub fn size(&self) -> usize {
        self.primitive_type().size()
    }

    /// Encodes the value as little-endian bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MemoryValue::I8(v) => v.to_le_bytes().to_vec(),
            MemoryValue::I16(v) => v.to_le_bytes().to_vec(),
            MemoryValue::I32(v) => v.to_le_bytes().to_vec(),
            MemoryValue::I64(v) => v.to_le_bytes().to_vec(),
            MemoryValue::F32(v) => v.to_le_bytes().to_vec(),
            MemoryValue::F64(v) => v.to_le_bytes().to_vec(),
        }
    }

    /// Decodes a value of the given type from the start of `bytes`
    pub fn from_bytes(bytes: &[u8], value_type: PrimitiveType) -> Option<Self> {
        match value_type {
            PrimitiveType::Byte => i8::from_le_slice(bytes).map(MemoryValue::I8),
            PrimitiveType::Word => i16::from_le_slice(bytes).map(MemoryValue::I16),
            PrimitiveType::Dword => i32::from_le_slice(bytes).map(MemoryValue::I32),
            PrimitiveType::Qword => i64::from_le_slice(bytes).map(MemoryValue::I64),
            PrimitiveType::Float => f32::from_le_slice(bytes).map(MemoryValue::F32),
            PrimitiveType::Double => f64::from_le_slice(bytes).map(MemoryValue::F64),
        }
    }

    /// Gets the primitive type of this value
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            MemoryValue::I8(_) => PrimitiveType::Byte,
            MemoryValue::I16(_) => PrimitiveType::Word,
            MemoryValue::I32(_) => PrimitiveType::Dword,
            MemoryValue::I64(_) => PrimitiveType::Qword,
            MemoryValue::F32(_) => PrimitiveType::Float,
            MemoryValue::F64(_) => PrimitiveType::Double,
        }
    }
}

impl fmt::Display for MemoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryValue::I8(v) => write!(f, "{}", v),
            MemoryValue::I16(v) => write!(f, "{}", v),
            MemoryValue::I32(v) => write!(f, "{}", v),
            MemoryValue::I64(v) => write!(f, "{}", v),
            MemoryValue::F32(v) => write!(f, "{:.6}", v),
            MemoryValue::F64(v) => write!(f, "{:.6}", v),
        }
    }
}

/// Rust scalar types that map onto a [`PrimitiveType`]
pub trait Primitive: Copy + PartialOrd + fmt::Display + Send + Sync + 'static {
    const TYPE: PrimitiveType;

    /// Decodes from the first `size_of::<Self>()` bytes, little-endian
    fn from_le_slice(bytes: &[u8]) -> Option<Self>;

    /// Encodes as little-endian bytes
    fn to_le_vec(self) -> Vec<u8>;

    fn into_value(self) -> MemoryValue;
}

macro_rules! impl_primitive {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl Primitive for $ty {
            const TYPE: PrimitiveType = PrimitiveType::$kind;

            fn from_le_slice(bytes: &[u8]) -> Option<Self> {
                let raw = bytes.get(..std::mem::size_of::<$ty>())?;
                raw.try_into().ok().map(<$ty>::from_le_bytes)
            }

            fn to_le_vec(self) -> Vec<u8> {
                self.to_le_bytes().to_vec()
            }

            fn into_value(self) -> MemoryValue {
                MemoryValue::$variant(self)
            }
        }
    };
}

impl_primitive!(i8, Byte, I8);
impl_primitive!(i16, Word, I16);
impl_primitive!(i32, Dword, I32);
impl_primitive!(i64, Qword, I64);
impl_primitive!(f32, Float, F32);
impl_primitive!(f64, Double, F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_sizes_and_alignment() {
        assert_eq!(PrimitiveType::Byte.alignment(), 1);
        assert_eq!(PrimitiveType::Word.alignment(), 2);
        assert_eq!(PrimitiveType::Dword.alignment(), 4);
        assert_eq!(PrimitiveType::Qword.size(), 8);
        assert_eq!(PrimitiveType::Qword.alignment(), 4);
        assert_eq!(PrimitiveType::Double.alignment(), 4);
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!("DWORD".parse::<PrimitiveType>().unwrap(), PrimitiveType::Dword);
        assert_eq!("f64".parse::<PrimitiveType>().unwrap(), PrimitiveType::Double);
        assert!("string".parse::<PrimitiveType>().is_err());
        assert_eq!(PrimitiveType::from_index(5), Some(PrimitiveType::Qword));
        assert_eq!(PrimitiveType::from_index(6), None);
    }

    #[test]
    fn test_value_parse_truncates_integers() {
        assert_eq!(
            MemoryValue::parse("300", PrimitiveType::Byte).unwrap(),
            MemoryValue::I8(44)
        );
        assert_eq!(
            MemoryValue::parse(" -2 ", PrimitiveType::Word).unwrap(),
            MemoryValue::I16(-2)
        );
        assert_eq!(
            MemoryValue::parse("4294967297", PrimitiveType::Dword).unwrap(),
            MemoryValue::I32(1)
        );
        assert!(MemoryValue::parse("1.5", PrimitiveType::Dword).is_err());
        assert!(MemoryValue::parse("", PrimitiveType::Qword).is_err());
    }

    #[test]
    fn test_value_parse_floats() {
        assert_eq!(
            MemoryValue::parse("1.5", PrimitiveType::Float).unwrap(),
            MemoryValue::F32(1.5)
        );
        assert_eq!(
            MemoryValue::parse("100", PrimitiveType::Double).unwrap(),
            MemoryValue::F64(100.0)
        );
    }

    #[test]
    fn test_value_bytes() {
        assert_eq!(MemoryValue::I32(0x12345678).to_bytes(), vec![0x78, 0x56, 0x34, 0x12]);
        assert_eq!(
            MemoryValue::from_bytes(&[0x78, 0x56, 0x34, 0x12, 0xFF], PrimitiveType::Dword),
            Some(MemoryValue::I32(0x12345678))
        );
        assert_eq!(MemoryValue::from_bytes(&[1, 2, 3], PrimitiveType::Dword), None);
    }

    #[test]
    fn test_float_equality_is_exact() {
        assert_eq!(MemoryValue::F32(-0.0), MemoryValue::F32(0.0));
        assert_ne!(MemoryValue::F32(f32::NAN), MemoryValue::F32(f32::NAN));
        assert_ne!(MemoryValue::F32(1.0), MemoryValue::F32(1.0 + f32::EPSILON));
    }

    #[test]
    fn test_display_matches_printf() {
        assert_eq!(MemoryValue::F32(1.5).to_string(), "1.500000");
        assert_eq!(MemoryValue::I64(-7).to_string(), "-7");
    }

    #[test]
    fn test_primitive_trait() {
        assert_eq!(i16::from_le_slice(&[0x34, 0x12]), Some(0x1234));
        assert_eq!(<f64 as Primitive>::TYPE, PrimitiveType::Double);
        assert_eq!(7i8.into_value(), MemoryValue::I8(7));
        assert_eq!(1i32.to_le_vec(), vec![1, 0, 0, 0]);
    }
}
