//! Linux system layer for the KPM channel
//!
//! Holds the raw `prctl` system call and errno helpers. All unsafe FFI
//! used to talk to the kernel extension is contained within this module.

pub mod bindings;
pub mod utils;

pub use bindings::prctl;
pub use utils::ErrorCode;

/// Check if running on a platform where the KPM channel can exist
pub fn is_supported_platform() -> bool {
    cfg!(any(target_os = "linux", target_os = "android"))
}

/// Whether the current process runs as root
pub fn is_root() -> bool {
    // SAFETY: getuid has no preconditions and cannot fail.
    unsafe { libc::getuid() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_support() {
        assert!(is_supported_platform());
    }
}
