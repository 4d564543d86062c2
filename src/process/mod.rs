//! Process lookup over the proc filesystem
//!
//! This module maps command-line names to pids, lists processes and
//! checks liveness. The proc root is configurable so the same code runs
//! against a fabricated tree.

pub mod enumerator;
pub mod resolver;

pub use enumerator::{enumerate_processes, read_process_name, ProcessEnumerator};
pub use resolver::{ProcessResolver, DEFAULT_PROC_ROOT};

use crate::config::ProcessConfig;

impl From<&ProcessConfig> for ProcessResolver {
    fn from(config: &ProcessConfig) -> Self {
        ProcessResolver::new(config.proc_root.clone())
    }
}
