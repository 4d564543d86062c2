//! The repurposed `prctl` system call used as the KPM side channel
//!
//! The kernel extension hooks `prctl` and claims calls whose first argument
//! is one of its magic numbers; every other `prctl` passes through untouched.

use libc::{c_long, c_void};

/// Magic for callers built with 64-bit pointers ("nam6")
pub const MAGIC_64: u32 = 0x6e61_6d36;
/// Magic for callers built with 32-bit pointers ("nam3")
pub const MAGIC_32: u32 = 0x6e61_6d33;

/// Issues `syscall(SYS_prctl, magic, command, 0, 0, 0)`.
///
/// Returns the non-negative return value, or the errno on failure.
///
/// # Safety
/// `command` must point to a live request structure whose buffer pointer is
/// valid for the requested length and direction for the whole call.
pub unsafe fn kpm_syscall(magic: u32, command: *mut c_void) -> Result<usize, i32> {
    let ret = libc::syscall(
        libc::SYS_prctl,
        magic as c_long,
        command,
        0 as c_long,
        0 as c_long,
        0 as c_long,
    );

    if ret < 0 {
        Err(last_errno())
    } else {
        Ok(ret as usize)
    }
}

/// Reads the calling thread's errno
pub fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_values() {
        assert_eq!(&MAGIC_64.to_be_bytes(), b"nam6");
        assert_eq!(&MAGIC_32.to_be_bytes(), b"nam3");
    }
}
