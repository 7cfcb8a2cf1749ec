use serde::{Deserialize, Serialize};

use crate::converter::EngineConfig;
use crate::retention::RetentionConfig;

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.engine.max_parallel_processes, 4);
        assert_eq!(config.engine.ffmpeg_log_level, "info");
        assert_eq!(config.retention.max_age_secs, 7200);
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.engine.output_dir, config.engine.output_dir);
        assert_eq!(parsed.retention.directories, config.retention.directories);
    }
}
