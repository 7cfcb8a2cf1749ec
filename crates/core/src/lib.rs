pub mod config;
pub mod converter;
pub mod retention;
pub mod testing;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use converter::{
    ConversionEngine, ConversionOptions, ConversionProgress, ConversionRequest, ConversionResult,
    ConverterError, EngineConfig, EngineError, ProgressSink,
};
pub use retention::{RetentionConfig, RetentionSweeper, SweepReport};
