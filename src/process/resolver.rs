//! Name to pid resolution

use super::enumerator::{enumerate_processes, read_process_name, ProcessEnumerator};
use crate::core::types::{MemoryError, MemoryResult, ProcessHandle, ProcessId, ProcessInfo};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default mount point of the proc filesystem
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Resolves targets by the first argument of their command line
#[derive(Debug, Clone)]
pub struct ProcessResolver {
    proc_root: PathBuf,
}

impl Default for ProcessResolver {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcessResolver {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        ProcessResolver {
            proc_root: proc_root.into(),
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    /// Returns the lowest pid whose first command-line argument equals `name`.
    ///
    /// Exact comparison only: `com.example` does not match
    /// `com.example:remote`. Nothing is cached.
    pub fn resolve(&self, name: &str) -> Option<ProcessId> {
        let mut processes = match ProcessEnumerator::new(&self.proc_root) {
            Ok(processes) => processes,
            Err(e) => {
                warn!(proc_root = %self.proc_root.display(), error = %e, "Cannot list processes");
                return None;
            }
        };
        let pid = processes.find(|p| p.name == name).map(|p| p.pid);
        debug!(name, ?pid, "Resolved process name");
        pid
    }

    /// Like [`resolve`](Self::resolve), but produces a handle or
    /// [`MemoryError::ProcessNotFound`]
    pub fn find(&self, name: &str) -> MemoryResult<ProcessHandle> {
        let pid = self
            .resolve(name)
            .ok_or_else(|| MemoryError::ProcessNotFound(name.to_string()))?;
        ProcessHandle::new(pid, name)
    }

    /// Every process whose command line could be read
    pub fn list_processes(&self) -> MemoryResult<Vec<ProcessInfo>> {
        enumerate_processes(&self.proc_root)
    }

    /// Whether `pid` still has a readable proc entry
    pub fn is_alive(&self, pid: ProcessId) -> bool {
        pid > 0 && read_process_name(&self.proc_root, pid).is_some()
    }

    /// Sends `SIGKILL` to the process called `name`
    pub fn kill_process(&self, name: &str) -> MemoryResult<ProcessId> {
        let handle = self.find(name)?;

        // SAFETY: kill has no memory-safety preconditions; the pid is positive
        // so this never signals a process group.
        if unsafe { libc::kill(handle.pid(), libc::SIGKILL) } != 0 {
            let err = io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(libc::EPERM) => MemoryError::PermissionDenied(format!(
                    "cannot signal {} (pid {})",
                    name,
                    handle.pid()
                )),
                Some(libc::ESRCH) => MemoryError::ProcessNotFound(name.to_string()),
                _ => MemoryError::IoError(err),
            });
        }

        info!(name, pid = handle.pid(), "Killed process");
        Ok(handle.pid())
    }
}
