//! Configuration validator for kpm-memtool
//!
//! Validates configuration values to ensure they are within acceptable ranges.

use super::loader::{
    ChannelConfig, Config, ConfigError, DisplayConfig, LoggingConfig, ProcessConfig, ScannerConfig,
};
use tracing::warn;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_channel(&config.channel)?;
        Self::validate_scanner(&config.scanner)?;
        Self::validate_process(&config.process)?;
        Self::validate_display(&config.display)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    /// Validates channel configuration
    fn validate_channel(channel: &ChannelConfig) -> Result<(), ConfigError> {
        if channel.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "Channel max_retries must be at least 1".to_string(),
            ));
        }

        if channel.probe_pid <= 0 {
            return Err(ConfigError::Invalid(
                "Channel probe_pid must be a positive pid".to_string(),
            ));
        }

        if channel.magic_64 == channel.magic_32 {
            return Err(ConfigError::Invalid(
                "Channel magic_64 and magic_32 must differ".to_string(),
            ));
        }

        if channel.present_error_codes.iter().any(|&code| code <= 0) {
            return Err(ConfigError::Invalid(
                "Channel present_error_codes must be positive errno values".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates scanner configuration
    fn validate_scanner(scanner: &ScannerConfig) -> Result<(), ConfigError> {
        // Power of two >= 8 keeps every chunk boundary aligned for all types
        if !scanner.chunk_size.is_power_of_two() || scanner.chunk_size < 8 {
            return Err(ConfigError::Invalid(
                "Chunk size must be a power of 2 and at least 8".to_string(),
            ));
        }

        if scanner.chunk_size > 1048576 {
            return Err(ConfigError::Invalid(
                "Chunk size cannot exceed the driver's 1MB transfer limit".to_string(),
            ));
        }

        if scanner.safe_mode_sleep_ms > 1000 {
            warn!(
                sleep_ms = scanner.safe_mode_sleep_ms,
                "Safe mode sleep above one second per chunk"
            );
        }

        Ok(())
    }

    /// Validates process configuration
    fn validate_process(process: &ProcessConfig) -> Result<(), ConfigError> {
        if process.proc_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "Process proc_root cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates display configuration
    fn validate_display(display: &DisplayConfig) -> Result<(), ConfigError> {
        if display.result_limit == 0 {
            return Err(ConfigError::Invalid(
                "Display result_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates logging configuration
    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, valid_levels
            )));
        }

        Ok(())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_channel() {
        let mut config = Config::default();
        config.channel.max_retries = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.channel.probe_pid = 0;
        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("probe_pid"));

        let mut config = Config::default();
        config.channel.magic_32 = config.channel.magic_64;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.channel.present_error_codes = vec![-2];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_chunk_size() {
        let mut config = Config::default();
        config.scanner.chunk_size = 0;
        assert!(validate_config(&config).is_err());

        config.scanner.chunk_size = 1000; // Not power of 2
        assert!(validate_config(&config).is_err());

        config.scanner.chunk_size = 4; // Too small for QWORD
        assert!(validate_config(&config).is_err());

        config.scanner.chunk_size = 2 * 1048576;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_process_and_display() {
        let mut config = Config::default();
        config.process.proc_root = PathBuf::new();
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.display.result_limit = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("log level"));
    }

    #[test]
    fn test_edge_cases() {
        let mut config = Config::default();
        config.scanner.chunk_size = 8;
        config.channel.max_retries = 1;
        config.display.result_limit = 1;
        assert!(validate_config(&config).is_ok());

        config.scanner.chunk_size = 1048576;
        assert!(validate_config(&config).is_ok());
    }
}
