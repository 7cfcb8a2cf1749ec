//! Converter module: format routing, conversion strategies and the facade
//! that ties them together.
//!
//! A [`ConversionEngine`] resolves a strategy from an ordered
//! [`CapabilityTable`], hands it a fresh output path from the
//! [`OutputManager`], and only returns that path once the file exists and is
//! non-empty. Anything written by a failed run is deleted.
//!
//! # Supported conversions
//!
//! - Raster images (resize, re-encode) and image to PDF
//! - PDF to image (first page) and PDF to text
//! - Video transcode, video to animated GIF and audio extraction (FFmpeg)
//! - Audio transcode (FFmpeg)
//! - Zip-family archive repackaging
//!
//! # Example
//!
//! ```ignore
//! use mediaconv_core::converter::{ConversionEngine, ConversionOptions, ConversionRequest, EngineConfig};
//!
//! let engine = ConversionEngine::new(&EngineConfig::default());
//! engine.validate().await?;
//!
//! let options = ConversionOptions::from_pairs([("fps", "10"), ("width", "320")])?;
//! let request = ConversionRequest::new("/uploads/clip.mp4", "gif").with_options(options);
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let result = engine.convert_with_progress(request, Arc::new(tx)).await?;
//! println!("Wrote {} in {} ms", result.file_name, result.duration_ms);
//! ```

mod capabilities;
mod config;
mod engine;
mod error;
mod output;
mod progress;
mod router;
mod runner;
mod strategies;
mod types;

pub use capabilities::{
    CapabilityDescriptor, CapabilityTable, ARCHIVE_INPUTS, AUDIO_FORMATS, RASTER_INPUTS,
    RASTER_OUTPUTS, VIDEO_INPUTS, VIDEO_OUTPUTS,
};
pub use config::EngineConfig;
pub use engine::ConversionEngine;
pub use error::{ConverterError, EngineError};
pub use output::OutputManager;
pub use progress::{NoopProgress, ProgressReporter, ProgressSink};
pub use router::{format_of, normalize_format, FormatRouter};
pub use runner::{ProcessRunner, ProgressParser};
pub use strategies::{
    audio_codec_for, ArchivePassthrough, AudioExtract, AudioTranscode, ConversionStrategy,
    DocumentToImage, DocumentToText, FfmpegArgs, ImageToDocument, RasterTransform,
    VideoToAnimatedImage, VideoTranscode,
};
pub use types::{
    ConversionOptions, ConversionProgress, ConversionRequest, ConversionResult, ConversionTask,
    ProcessInvocation, ProgressWindow, QualityLevel, QualityOption, ResizeMode,
};
