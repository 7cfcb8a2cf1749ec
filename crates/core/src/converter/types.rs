//! Types for the converter module.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::error::ConverterError;

/// Option keys that stay strings even when they look numeric.
const STRING_OPTIONS: &[&str] = &["bitrate", "resolution"];

/// Compression level for encoders that take a coarse quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    High,
    Medium,
    Low,
}

impl QualityLevel {
    /// x264 constant rate factor for this tier.
    pub fn crf(&self) -> u8 {
        match self {
            Self::High => 18,
            Self::Medium => 23,
            Self::Low => 28,
        }
    }

    /// Audio bitrate for this tier.
    pub fn audio_bitrate(&self) -> &'static str {
        match self {
            Self::High => "320k",
            Self::Medium => "192k",
            Self::Low => "128k",
        }
    }

    /// Raster encoder quality for this tier.
    pub fn raster_quality(&self) -> u8 {
        match self {
            Self::High => 95,
            Self::Medium => 85,
            Self::Low => 70,
        }
    }

    fn from_percent(percent: u8) -> Self {
        match percent {
            80..=u8::MAX => Self::High,
            50..=79 => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// The `quality` option. Its meaning depends on the media family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QualityOption {
    /// 0-100 scale (raster encoders).
    Percent(u8),
    /// Tier (video and audio encoders).
    Level(QualityLevel),
    /// Bitrate string such as `"192k"` (audio extraction).
    Bitrate(String),
}

/// How a raster image is fitted into the requested box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Scale to fit inside the box, preserving aspect ratio.
    #[default]
    Fit,
    /// Scale and crop to fill the box exactly.
    Cover,
}

/// Conversion options sent by the front end. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConversionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize: Option<ResizeMode>,
    /// Target frame size as `WxH`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    /// Offset in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    /// Window length in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
}

impl ConversionOptions {
    /// Builds options from `key=value` style pairs, inferring numbers.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConverterError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut map = serde_json::Map::new();
        for (key, value) in pairs {
            let key = key.into();
            let raw = value.as_ref().trim();
            let value = if STRING_OPTIONS.contains(&key.as_str()) {
                Value::from(raw)
            } else if let Ok(n) = raw.parse::<u64>() {
                Value::from(n)
            } else if let Some(n) = raw.parse::<f64>().ok().filter(|n| n.is_finite()) {
                Value::from(n)
            } else {
                Value::from(raw)
            };
            map.insert(key, value);
        }

        serde_json::from_value(Value::Object(map))
            .map_err(|e| ConverterError::invalid_option("options", e.to_string()))
    }

    /// Raster encoder quality, 0-100, default 90.
    pub fn raster_quality(&self) -> Result<u8, ConverterError> {
        match &self.quality {
            None => Ok(90),
            Some(QualityOption::Percent(p)) if *p <= 100 => Ok(*p),
            Some(QualityOption::Percent(p)) => Err(ConverterError::invalid_option(
                "quality",
                format!("{p} is outside 0-100"),
            )),
            Some(QualityOption::Level(level)) => Ok(level.raster_quality()),
            Some(QualityOption::Bitrate(s)) => Err(ConverterError::invalid_option(
                "quality",
                format!("expected 0-100, got {s:?}"),
            )),
        }
    }

    /// Video quality tier, default medium.
    pub fn video_quality(&self) -> Result<QualityLevel, ConverterError> {
        match &self.quality {
            None => Ok(QualityLevel::Medium),
            Some(QualityOption::Level(level)) => Ok(*level),
            Some(QualityOption::Percent(p)) => Ok(QualityLevel::from_percent(*p)),
            Some(QualityOption::Bitrate(s)) => Err(ConverterError::invalid_option(
                "quality",
                format!("expected high, medium or low, got {s:?}"),
            )),
        }
    }

    /// Bitrate used when extracting audio, driven by `quality`. Default `192k`.
    pub fn extract_bitrate(&self) -> Result<String, ConverterError> {
        match &self.quality {
            None => Ok("192k".to_string()),
            Some(QualityOption::Bitrate(s)) => validate_bitrate("quality", s),
            Some(QualityOption::Level(level)) => Ok(level.audio_bitrate().to_string()),
            Some(QualityOption::Percent(p)) => {
                Ok(QualityLevel::from_percent(*p).audio_bitrate().to_string())
            }
        }
    }

    /// Bitrate used when transcoding audio. Default `192k`.
    pub fn audio_bitrate(&self) -> Result<String, ConverterError> {
        match &self.bitrate {
            None => Ok("192k".to_string()),
            Some(s) => validate_bitrate("bitrate", s),
        }
    }

    /// Output sample rate in Hz. Default 44100.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(44_100)
    }

    /// Parses `resolution` into width and height.
    pub fn frame_size(&self) -> Result<Option<(u32, u32)>, ConverterError> {
        let Some(raw) = self.resolution.as_deref() else {
            return Ok(None);
        };

        let invalid = || {
            ConverterError::invalid_option("resolution", format!("expected WxH, got {raw:?}"))
        };
        let (w, h) = raw.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let w: u32 = w.trim().parse().map_err(|_| invalid())?;
        let h: u32 = h.trim().parse().map_err(|_| invalid())?;
        if w == 0 || h == 0 {
            return Err(invalid());
        }
        Ok(Some((w, h)))
    }

    /// Non-negative `startTime`, if set.
    pub fn start_offset(&self) -> Result<Option<f64>, ConverterError> {
        non_negative("startTime", self.start_time)
    }

    /// Positive `duration`, if set.
    pub fn window_length(&self) -> Result<Option<f64>, ConverterError> {
        match self.duration {
            Some(d) if !(d.is_finite() && d > 0.0) => Err(ConverterError::invalid_option(
                "duration",
                format!("{d} is not a positive number of seconds"),
            )),
            other => Ok(other),
        }
    }
}

fn non_negative(name: &str, value: Option<f64>) -> Result<Option<f64>, ConverterError> {
    match value {
        Some(v) if !(v.is_finite() && v >= 0.0) => Err(ConverterError::invalid_option(
            name,
            format!("{v} is not a valid offset in seconds"),
        )),
        other => Ok(other),
    }
}

fn validate_bitrate(name: &str, raw: &str) -> Result<String, ConverterError> {
    let raw = raw.trim();
    let digits = raw.strip_suffix(['k', 'K']).unwrap_or(raw);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConverterError::invalid_option(
            name,
            format!("expected a bitrate like \"192k\", got {raw:?}"),
        ));
    }
    Ok(raw.to_lowercase())
}

/// A conversion request from the caller.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Input file path.
    pub input_path: PathBuf,
    /// Target format token, e.g. `"png"` or `".mp3"`.
    pub target_format: String,
    /// Conversion options.
    pub options: ConversionOptions,
}

impl ConversionRequest {
    /// Creates a request with default options.
    pub fn new(input_path: impl Into<PathBuf>, target_format: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            target_format: target_format.into(),
            options: ConversionOptions::default(),
        }
    }

    /// Sets the options.
    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }
}

/// Everything a strategy needs for one execution.
#[derive(Debug, Clone, Copy)]
pub struct ConversionTask<'a> {
    pub input_path: &'a Path,
    pub output_path: &'a Path,
    pub input_format: &'a str,
    pub output_format: &'a str,
    pub options: &'a ConversionOptions,
}

/// Result of a successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Output file path.
    pub output_path: PathBuf,
    /// Output file name (last path component).
    pub file_name: String,
    /// Resolved input format.
    pub input_format: String,
    /// Resolved output format.
    pub output_format: String,
    /// Output file size in bytes.
    pub output_size_bytes: u64,
    /// Conversion duration in milliseconds.
    pub duration_ms: u64,
}

/// Progress update during conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionProgress {
    /// Progress percentage (0 - 100).
    pub percent: u8,
    /// Human-readable status.
    pub message: String,
}

/// Portion of the input a process actually covers, used to scale progress.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressWindow {
    /// Seconds skipped at the start of the input.
    pub offset: f64,
    /// Maximum seconds processed after the offset.
    pub length: Option<f64>,
}

/// An external process to run: binary plus argument vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub window: ProgressWindow,
}

impl ProcessInvocation {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            window: ProgressWindow::default(),
        }
    }

    /// Sets the progress window.
    pub fn with_window(mut self, window: ProgressWindow) -> Self {
        self.window = window;
        self
    }

    /// Whether `flag` is immediately followed by `value` in the argument vector.
    pub fn has_arg_pair(&self, flag: &str, value: &str) -> bool {
        self.args
            .windows(2)
            .any(|pair| pair[0] == flag && pair[1] == value)
    }
}
