//! Process enumeration over the proc filesystem

use crate::core::types::{MemoryResult, ProcessId, ProcessInfo};
use std::fs;
use std::path::{Path, PathBuf};

/// Iterates over processes under a proc root in ascending pid order.
///
/// The directory is listed once when the enumerator is created; processes
/// that exit afterwards are skipped silently when their `cmdline` can no
/// longer be read.
pub struct ProcessEnumerator {
    proc_root: PathBuf,
    pids: std::vec::IntoIter<ProcessId>,
}

impl ProcessEnumerator {
    /// Create a new process enumerator
    pub fn new(proc_root: impl AsRef<Path>) -> MemoryResult<Self> {
        let proc_root = proc_root.as_ref().to_path_buf();
        let mut pids: Vec<ProcessId> = fs::read_dir(&proc_root)?
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .filter(|pid: &ProcessId| *pid > 0)
            .collect();
        pids.sort_unstable();

        Ok(ProcessEnumerator {
            proc_root,
            pids: pids.into_iter(),
        })
    }
}

impl Iterator for ProcessEnumerator {
    type Item = ProcessInfo;

    fn next(&mut self) -> Option<Self::Item> {
        self.pids.by_ref().find_map(|pid| {
            read_process_name(&self.proc_root, pid).map(|name| ProcessInfo::new(pid, name))
        })
    }
}

/// Reads the first NUL-terminated argument of `<proc_root>/<pid>/cmdline`.
///
/// Kernel threads have an empty command line and yield an empty string.
pub fn read_process_name(proc_root: &Path, pid: ProcessId) -> Option<String> {
    let raw = fs::read(proc_root.join(pid.to_string()).join("cmdline")).ok()?;
    let first = raw.split(|&b| b == 0).next().unwrap_or_default();
    Some(String::from_utf8_lossy(first).into_owned())
}

/// Enumerate all readable processes
pub fn enumerate_processes(proc_root: impl AsRef<Path>) -> MemoryResult<Vec<ProcessInfo>> {
    Ok(ProcessEnumerator::new(proc_root)?.collect())
}
