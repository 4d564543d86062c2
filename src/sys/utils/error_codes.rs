//! errno handling for KPM channel results

use crate::core::types::MemoryError;
use std::fmt;

/// errno values the channel cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success,
    NotPermitted,
    NoEntry,
    Interrupted,
    NoDeviceOrAddress,
    BadAddress,
    InvalidArgument,
    Other(i32),
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        match code {
            0 => ErrorCode::Success,
            libc::EPERM => ErrorCode::NotPermitted,
            libc::ENOENT => ErrorCode::NoEntry,
            libc::EINTR => ErrorCode::Interrupted,
            libc::ENXIO => ErrorCode::NoDeviceOrAddress,
            libc::EFAULT => ErrorCode::BadAddress,
            libc::EINVAL => ErrorCode::InvalidArgument,
            _ => ErrorCode::Other(code),
        }
    }
}

impl ErrorCode {
    /// Raw errno value
    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::Success => 0,
            ErrorCode::NotPermitted => libc::EPERM,
            ErrorCode::NoEntry => libc::ENOENT,
            ErrorCode::Interrupted => libc::EINTR,
            ErrorCode::NoDeviceOrAddress => libc::ENXIO,
            ErrorCode::BadAddress => libc::EFAULT,
            ErrorCode::InvalidArgument => libc::EINVAL,
            ErrorCode::Other(code) => *code,
        }
    }

    /// Meaning of the code when the KPM extension produced it
    pub fn kpm_meaning(&self) -> &'static str {
        match self {
            ErrorCode::Success => "ok",
            ErrorCode::NoEntry => "target pid not found by driver",
            ErrorCode::NoDeviceOrAddress => "driver failed to access target memory",
            ErrorCode::Interrupted => "interrupted",
            ErrorCode::InvalidArgument => "prctl rejected the request (driver not loaded?)",
            ErrorCode::NotPermitted => "not permitted",
            ErrorCode::BadAddress => "bad buffer address",
            ErrorCode::Other(_) => "unrecognised error",
        }
    }

    /// Convert to MemoryError
    pub fn to_memory_error(self) -> MemoryError {
        MemoryError::ChannelUnavailable(self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "errno {} ({})",
            self.code(),
            std::io::Error::from_raw_os_error(self.code())
        )
    }
}
