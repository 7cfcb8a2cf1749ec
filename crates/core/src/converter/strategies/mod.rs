//! Conversion strategies, one per media family.

mod archive;
mod document;
mod ffmpeg;
mod raster;

pub use archive::ArchivePassthrough;
pub use document::{DocumentToImage, DocumentToText, ImageToDocument};
pub use ffmpeg::{
    audio_codec_for, AudioExtract, AudioTranscode, FfmpegArgs, VideoToAnimatedImage,
    VideoTranscode,
};
pub use raster::RasterTransform;

use async_trait::async_trait;

use super::error::ConverterError;
use super::progress::ProgressReporter;
use super::types::ConversionTask;

/// A unit of conversion logic for one media family.
///
/// Implementations write to `task.output_path` and report progress below 100.
/// On failure the facade deletes whatever was written.
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    /// Returns the name of this strategy.
    fn name(&self) -> &str;

    /// Performs the conversion.
    async fn execute(
        &self,
        task: &ConversionTask<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), ConverterError>;
}

/// Runs blocking work on the blocking pool, flattening join errors into I/O
/// errors.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ConverterError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ConverterError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ConverterError::Io(std::io::Error::other(e.to_string())))?
}
