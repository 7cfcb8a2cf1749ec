use super::{types::Config, ConfigError};

/// FFmpeg log levels that still print the duration and `time=` markers.
const PROGRESS_LOG_LEVELS: &[&str] = &["info", "verbose", "debug", "trace"];

/// Validate configuration
/// Currently validates:
/// - Process limit and document DPI are positive
/// - FFmpeg log level keeps progress markers on stderr
/// - Retention age and interval are positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let engine = &config.engine;
    if engine.max_parallel_processes == 0 {
        return Err(ConfigError::ValidationError(
            "engine.max_parallel_processes cannot be 0".to_string(),
        ));
    }
    if engine.document_dpi == 0 {
        return Err(ConfigError::ValidationError(
            "engine.document_dpi cannot be 0".to_string(),
        ));
    }
    if !PROGRESS_LOG_LEVELS.contains(&engine.ffmpeg_log_level.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "engine.ffmpeg_log_level must be one of {}, got {:?}",
            PROGRESS_LOG_LEVELS.join(", "),
            engine.ffmpeg_log_level
        )));
    }
    if engine.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.output_dir cannot be empty".to_string(),
        ));
    }

    // Retention validation
    let retention = &config.retention;
    if retention.max_age_secs == 0 {
        return Err(ConfigError::ValidationError(
            "retention.max_age_secs cannot be 0".to_string(),
        ));
    }
    if retention.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "retention.interval_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_parallel_fails() {
        let mut config = Config::default();
        config.engine.max_parallel_processes = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_quiet_log_level_fails() {
        let mut config = Config::default();
        config.engine.ffmpeg_log_level = "error".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("ffmpeg_log_level"));

        config.engine.ffmpeg_log_level = "debug".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_retention_fails() {
        let mut config = Config::default();
        config.retention.interval_secs = 0;
        assert!(validate_config(&config).is_err());
    }
}
