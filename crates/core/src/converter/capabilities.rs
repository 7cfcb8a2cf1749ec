//! Ordered table of supported conversions.

use std::fmt;
use std::sync::Arc;

use super::config::EngineConfig;
use super::runner::ProcessRunner;
use super::strategies::{
    ArchivePassthrough, AudioExtract, AudioTranscode, ConversionStrategy, DocumentToImage,
    DocumentToText, FfmpegArgs, ImageToDocument, RasterTransform, VideoToAnimatedImage,
    VideoTranscode,
};

pub const RASTER_INPUTS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif"];
pub const RASTER_OUTPUTS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff"];
pub const VIDEO_INPUTS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];
pub const VIDEO_OUTPUTS: &[&str] = &["mp4", "mov", "m4v"];
pub const AUDIO_FORMATS: &[&str] = &["mp3", "aac", "m4a", "wav", "flac", "ogg"];
pub const ARCHIVE_INPUTS: &[&str] = &["zip", "cbz", "jar"];

/// One row of the table: every input in `inputs` converts to every output in
/// `outputs` through `strategy`.
#[derive(Clone)]
pub struct CapabilityDescriptor {
    pub inputs: &'static [&'static str],
    pub outputs: &'static [&'static str],
    pub strategy: Arc<dyn ConversionStrategy>,
}

impl CapabilityDescriptor {
    pub fn new(
        inputs: &'static [&'static str],
        outputs: &'static [&'static str],
        strategy: impl ConversionStrategy + 'static,
    ) -> Self {
        Self {
            inputs,
            outputs,
            strategy: Arc::new(strategy),
        }
    }

    /// Whether this row covers the (already normalized) pair.
    pub fn accepts(&self, input: &str, output: &str) -> bool {
        self.inputs.contains(&input) && self.outputs.contains(&output)
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

/// Ordered capability descriptors. Earlier rows win when several accept the
/// same pair.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    descriptors: Vec<CapabilityDescriptor>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row (lowest precedence so far).
    pub fn with(mut self, descriptor: CapabilityDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// The built-in table. All process-backed strategies share `runner` so
    /// its permit limit applies engine-wide.
    pub fn standard(config: &EngineConfig, runner: ProcessRunner) -> Self {
        let ffmpeg = FfmpegArgs::from_config(config);

        Self::new()
            .with(CapabilityDescriptor::new(
                RASTER_INPUTS,
                RASTER_OUTPUTS,
                RasterTransform::new(),
            ))
            .with(CapabilityDescriptor::new(
                RASTER_INPUTS,
                &["pdf"],
                ImageToDocument::new(),
            ))
            .with(CapabilityDescriptor::new(
                &["pdf"],
                &["png", "jpg", "jpeg"],
                DocumentToImage::from_config(config, runner.clone()),
            ))
            .with(CapabilityDescriptor::new(
                &["pdf"],
                &["txt"],
                DocumentToText::new(),
            ))
            .with(CapabilityDescriptor::new(
                VIDEO_INPUTS,
                &["gif"],
                VideoToAnimatedImage::new(ffmpeg.clone(), runner.clone()),
            ))
            .with(CapabilityDescriptor::new(
                VIDEO_INPUTS,
                VIDEO_OUTPUTS,
                VideoTranscode::new(ffmpeg.clone(), runner.clone()),
            ))
            .with(CapabilityDescriptor::new(
                VIDEO_INPUTS,
                AUDIO_FORMATS,
                AudioExtract::new(ffmpeg.clone(), runner.clone()),
            ))
            .with(CapabilityDescriptor::new(
                AUDIO_FORMATS,
                AUDIO_FORMATS,
                AudioTranscode::new(ffmpeg, runner),
            ))
            .with(CapabilityDescriptor::new(
                ARCHIVE_INPUTS,
                &["zip"],
                ArchivePassthrough::new(),
            ))
    }

    pub fn descriptors(&self) -> &[CapabilityDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Output formats reachable from `input`, in table order, without
    /// duplicates.
    pub fn outputs_for(&self, input: &str) -> Vec<&'static str> {
        let mut outputs: Vec<&'static str> = Vec::new();
        for descriptor in self.descriptors.iter().filter(|d| d.inputs.contains(&input)) {
            for output in descriptor.outputs {
                if !outputs.contains(output) {
                    outputs.push(*output);
                }
            }
        }
        outputs
    }

    /// Every supported pair with the strategy that would handle it.
    pub fn pairs(&self) -> Vec<(&'static str, &'static str, &str)> {
        let mut pairs = Vec::new();
        for descriptor in &self.descriptors {
            for input in descriptor.inputs {
                for output in descriptor.outputs {
                    let shadowed = pairs
                        .iter()
                        .any(|(i, o, _): &(&str, &str, &str)| i == input && o == output);
                    if !shadowed {
                        pairs.push((*input, *output, descriptor.strategy.name()));
                    }
                }
            }
        }
        pairs
    }
}
