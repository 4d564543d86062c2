//! Default configuration values for kpm-memtool

use crate::memory::regions::RegionCategory;
use crate::sys::prctl;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub channel: ChannelDefaults,
    pub scanner: ScannerDefaults,
    pub freeze: FreezeDefaults,
    pub process: ProcessDefaults,
    pub display: DisplayDefaults,
    pub logging: LoggingDefaults,
}

/// Default KPM channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDefaults {
    pub magic_64: u32,
    pub magic_32: u32,
    pub present_error_codes: Vec<i32>,
    pub max_retries: u32,
    pub probe_pid: i32,
}

/// Default scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerDefaults {
    pub chunk_size: usize,
    pub safe_mode: bool,
    pub safe_mode_sleep_ms: u64,
    pub search_range: RegionCategory,
}

/// Default freeze configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreezeDefaults {
    pub delay_us: u64,
}

/// Default process lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDefaults {
    pub proc_root: PathBuf,
}

/// Default result rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayDefaults {
    pub result_limit: usize,
}

/// Default logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
    pub file: String,
}

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        channel: ChannelDefaults {
            magic_64: prctl::MAGIC_64,
            magic_32: prctl::MAGIC_32,
            // ENOENT: driver could not find the pid. ENXIO: driver read failed.
            present_error_codes: vec![libc::ENOENT, libc::ENXIO],
            max_retries: 100,
            probe_pid: 1,
        },
        scanner: ScannerDefaults {
            chunk_size: 131072, // 128KB
            safe_mode: false,
            safe_mode_sleep_ms: 1,
            search_range: RegionCategory::All,
        },
        freeze: FreezeDefaults { delay_us: 30000 },
        process: ProcessDefaults {
            proc_root: PathBuf::from("/proc"),
        },
        display: DisplayDefaults { result_limit: 100 },
        logging: LoggingDefaults {
            level: "info".to_string(),
            file: String::new(),
        },
    }
}
