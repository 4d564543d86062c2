//! Memory region catalog for target processes
//!
//! This module reads a target's memory map, parses it into regions,
//! classifies regions by their backing name, and filters them down to
//! the search range chosen for a scan.

pub mod enumerator;
pub mod filter;
pub mod protection;

pub use enumerator::{parse_line, parse_maps, read_maps, MemoryRegion};
pub use filter::{filter_regions, is_dangerous, RegionCategory, DANGEROUS_PATTERNS};
pub use protection::Permissions;

use crate::core::types::{Address, ProcessId};
use crate::process::DEFAULT_PROC_ROOT;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Produces region lists for a pid, fresh on every call
#[derive(Debug, Clone)]
pub struct RegionCatalog {
    proc_root: PathBuf,
    safe_mode: bool,
}

impl Default for RegionCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT, false)
    }
}

impl RegionCatalog {
    pub fn new(proc_root: impl Into<PathBuf>, safe_mode: bool) -> Self {
        RegionCatalog {
            proc_root: proc_root.into(),
            safe_mode,
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    pub fn safe_mode(&self) -> bool {
        self.safe_mode
    }

    pub fn set_safe_mode(&mut self, enabled: bool) {
        self.safe_mode = enabled;
    }

    /// Read-write regions of `pid` in `category`, in map order.
    ///
    /// An unreadable map yields an empty list.
    pub fn list_regions(&self, pid: ProcessId, category: RegionCategory) -> Vec<MemoryRegion> {
        let regions = match read_maps(&self.proc_root, pid) {
            Ok(regions) => regions,
            Err(e) => {
                warn!(pid, error = %e, "Cannot read memory map");
                return Vec::new();
            }
        };

        let selected = filter_regions(regions, category, self.safe_mode);
        debug!(
            pid,
            category = %category,
            safe_mode = self.safe_mode,
            count = selected.len(),
            "Listed regions"
        );
        selected
    }

    /// Start of the first mapping whose name contains `module`,
    /// regardless of permissions
    pub fn module_base(&self, pid: ProcessId, module: &str) -> Option<Address> {
        let regions = read_maps(&self.proc_root, pid).ok()?;
        regions
            .into_iter()
            .find(|region| region.name.contains(module))
            .map(|region| region.start)
    }
}
