//! Configuration loader for kpm-memtool
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use crate::memory::regions::RegionCategory;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_channel")]
    pub channel: ChannelConfig,

    #[serde(default = "default_scanner")]
    pub scanner: ScannerConfig,

    #[serde(default = "default_freeze")]
    pub freeze: FreezeConfig,

    #[serde(default = "default_process")]
    pub process: ProcessConfig,

    #[serde(default = "default_display")]
    pub display: DisplayConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

/// KPM channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_magic_64")]
    pub magic_64: u32,
    #[serde(default = "default_magic_32")]
    pub magic_32: u32,
    /// errno values that only the extension produces, so seeing one on the
    /// probe proves it intercepted the call
    #[serde(default = "default_present_error_codes")]
    pub present_error_codes: Vec<i32>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_probe_pid")]
    pub probe_pid: i32,
}

impl ChannelConfig {
    /// Magic matching this build's pointer width
    pub fn magic(&self) -> u32 {
        if cfg!(target_pointer_width = "64") {
            self.magic_64
        } else {
            self.magic_32
        }
    }
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_safe_mode")]
    pub safe_mode: bool,
    #[serde(default = "default_safe_mode_sleep_ms")]
    pub safe_mode_sleep_ms: u64,
    #[serde(default = "default_search_range")]
    pub search_range: RegionCategory,
}

impl ScannerConfig {
    pub fn safe_mode_sleep(&self) -> Duration {
        Duration::from_millis(self.safe_mode_sleep_ms)
    }
}

/// Freeze loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreezeConfig {
    #[serde(default = "default_delay_us")]
    pub delay_us: u64,
}

/// Process lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
}

/// Result rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path; empty logs to stderr
    #[serde(default = "default_log_file")]
    pub file: String,
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults only when the file is
    /// missing. A file that exists but does not parse is still an error.
    pub fn load_or_default(&self) -> Result<Config, ConfigError> {
        match self.load() {
            Err(ConfigError::FileNotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads configuration from `KPM_MEMTOOL_CONFIG`, or `kpm-memtool.toml` in
/// the working directory
pub fn load_config() -> Result<Config, ConfigError> {
    let path = std::env::var_os("KPM_MEMTOOL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("kpm-memtool.toml"));
    ConfigLoader::new(path).load_or_default()
}

// Default functions for serde
fn default_channel() -> ChannelConfig {
    let defaults = default_config();
    ChannelConfig {
        magic_64: defaults.channel.magic_64,
        magic_32: defaults.channel.magic_32,
        present_error_codes: defaults.channel.present_error_codes,
        max_retries: defaults.channel.max_retries,
        probe_pid: defaults.channel.probe_pid,
    }
}

fn default_scanner() -> ScannerConfig {
    let defaults = default_config();
    ScannerConfig {
        chunk_size: defaults.scanner.chunk_size,
        safe_mode: defaults.scanner.safe_mode,
        safe_mode_sleep_ms: defaults.scanner.safe_mode_sleep_ms,
        search_range: defaults.scanner.search_range,
    }
}

fn default_freeze() -> FreezeConfig {
    FreezeConfig {
        delay_us: default_config().freeze.delay_us,
    }
}

fn default_process() -> ProcessConfig {
    ProcessConfig {
        proc_root: default_config().process.proc_root,
    }
}

fn default_display() -> DisplayConfig {
    DisplayConfig {
        result_limit: default_config().display.result_limit,
    }
}

fn default_logging() -> LoggingConfig {
    let defaults = default_config();
    LoggingConfig {
        level: defaults.logging.level,
        file: defaults.logging.file,
    }
}

// Individual field defaults
fn default_magic_64() -> u32 {
    default_config().channel.magic_64
}

fn default_magic_32() -> u32 {
    default_config().channel.magic_32
}

fn default_present_error_codes() -> Vec<i32> {
    default_config().channel.present_error_codes
}

fn default_max_retries() -> u32 {
    default_config().channel.max_retries
}

fn default_probe_pid() -> i32 {
    default_config().channel.probe_pid
}

fn default_chunk_size() -> usize {
    default_config().scanner.chunk_size
}

fn default_safe_mode() -> bool {
    default_config().scanner.safe_mode
}

fn default_safe_mode_sleep_ms() -> u64 {
    default_config().scanner.safe_mode_sleep_ms
}

fn default_search_range() -> RegionCategory {
    default_config().scanner.search_range
}

fn default_delay_us() -> u64 {
    default_config().freeze.delay_us
}

fn default_proc_root() -> PathBuf {
    default_config().process.proc_root
}

fn default_result_limit() -> usize {
    default_config().display.result_limit
}

fn default_log_level() -> String {
    default_config().logging.level
}

fn default_log_file() -> String {
    default_config().logging.file
}

impl Default for Config {
    fn default() -> Self {
        Config {
            channel: default_channel(),
            scanner: default_scanner(),
            freeze: default_freeze(),
            process: default_process(),
            display: default_display(),
            logging: default_logging(),
        }
    }
}
