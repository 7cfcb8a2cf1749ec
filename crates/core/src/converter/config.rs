//! Configuration for the conversion engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the conversion engine and its external tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to the poppler `pdftoppm` binary used to render document pages.
    #[serde(default = "default_pdftoppm_path")]
    pub pdftoppm_path: PathBuf,

    /// Directory converted files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum external processes running at once.
    #[serde(default = "default_max_parallel")]
    pub max_parallel_processes: usize,

    /// FFmpeg log level. Must be `info` or more verbose so duration and
    /// elapsed-time markers reach stderr.
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Additional global ffmpeg arguments, placed before the output path.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,

    /// Resolution used when rendering document pages to images.
    #[serde(default = "default_document_dpi")]
    pub document_dpi: u32,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_pdftoppm_path() -> PathBuf {
    PathBuf::from("pdftoppm")
}

fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("mediaconv").join("converted")
}

fn default_max_parallel() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_document_dpi() -> u32 {
    150
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            pdftoppm_path: default_pdftoppm_path(),
            output_dir: default_output_dir(),
            max_parallel_processes: default_max_parallel(),
            ffmpeg_log_level: default_log_level(),
            extra_ffmpeg_args: Vec::new(),
            document_dpi: default_document_dpi(),
        }
    }
}

impl EngineConfig {
    /// Creates a new config with a custom ffmpeg path.
    pub fn with_ffmpeg_path(ffmpeg_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ..Default::default()
        }
    }

    /// Sets the output directory.
    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }

    /// Sets the pdftoppm path.
    pub fn with_pdftoppm_path(mut self, pdftoppm_path: PathBuf) -> Self {
        self.pdftoppm_path = pdftoppm_path;
        self
    }

    /// Sets the maximum parallel external processes.
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel_processes = max;
        self
    }
}
