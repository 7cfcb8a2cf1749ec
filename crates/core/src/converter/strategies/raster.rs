//! Raster image transform: resize and re-encode with the `image` crate.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{blocking, ConversionStrategy};
use crate::converter::error::ConverterError;
use crate::converter::progress::ProgressReporter;
use crate::converter::types::{ConversionTask, ResizeMode};

/// Target encoder and its quality setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RasterCodec {
    Jpeg { quality: u8 },
    Png { compression: CompressionType },
    Plain(ImageFormat),
}

impl RasterCodec {
    fn for_format(format: &str, quality: u8) -> Result<Self, ConverterError> {
        let codec = match codec_family(format) {
            "jpeg" => Self::Jpeg {
                quality: quality.clamp(1, 100),
            },
            "png" => Self::Png {
                compression: png_compression(quality),
            },
            "webp" => Self::Plain(ImageFormat::WebP),
            "gif" => Self::Plain(ImageFormat::Gif),
            "bmp" => Self::Plain(ImageFormat::Bmp),
            "tiff" => Self::Plain(ImageFormat::Tiff),
            other => return Err(ConverterError::unsupported("image", other)),
        };
        Ok(codec)
    }

    fn is_quality_aware(&self) -> bool {
        !matches!(self, Self::Plain(_))
    }
}

/// Collapses extension aliases to one name per codec.
fn codec_family(format: &str) -> &str {
    match format {
        "jpg" | "jpeg" => "jpeg",
        "tif" | "tiff" => "tiff",
        other => other,
    }
}

/// PNG takes `quality / 10` as a compression level.
pub fn png_compression(quality: u8) -> CompressionType {
    match quality.min(100) / 10 {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Largest size inside the `width` x `height` box that keeps the aspect ratio
/// and never exceeds the source.
pub fn fit_dimensions(source: (u32, u32), width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return source;
    }
    let box_w = width.unwrap_or(src_w).min(src_w);
    let box_h = height.unwrap_or(src_h).min(src_h);
    let scale = f64::min(
        f64::from(box_w) / f64::from(src_w),
        f64::from(box_h) / f64::from(src_h),
    );
    let w = (f64::from(src_w) * scale).round().max(1.0) as u32;
    let h = (f64::from(src_h) * scale).round().max(1.0) as u32;
    (w, h)
}

fn resize(image: DynamicImage, width: Option<u32>, height: Option<u32>, mode: ResizeMode) -> DynamicImage {
    let source = (image.width(), image.height());
    match (mode, width, height) {
        (_, None, None) => image,
        (ResizeMode::Cover, Some(w), Some(h)) => {
            let target = (w.min(source.0).max(1), h.min(source.1).max(1));
            if target == source {
                image
            } else {
                image.resize_to_fill(target.0, target.1, FilterType::Lanczos3)
            }
        }
        _ => {
            let target = fit_dimensions(source, width, height);
            if target == source {
                image
            } else {
                image.resize_exact(target.0, target.1, FilterType::Lanczos3)
            }
        }
    }
}

fn transform(
    input: &Path,
    output: &Path,
    codec: RasterCodec,
    width: Option<u32>,
    height: Option<u32>,
    mode: ResizeMode,
) -> Result<(u32, u32), ConverterError> {
    let image = ImageReader::open(input)?.with_guessed_format()?.decode()?;
    let image = resize(image, width, height, mode);
    let dimensions = (image.width(), image.height());

    let mut writer = BufWriter::new(File::create(output)?);
    match codec {
        RasterCodec::Jpeg { quality } => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))?;
        }
        RasterCodec::Png { compression } => {
            image.write_with_encoder(PngEncoder::new_with_quality(
                &mut writer,
                compression,
                PngFilter::Adaptive,
            ))?;
        }
        RasterCodec::Plain(format) => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut writer, format)?;
        }
    }
    writer.flush()?;

    Ok(dimensions)
}

/// Resizes and re-encodes raster images.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterTransform;

impl RasterTransform {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConversionStrategy for RasterTransform {
    fn name(&self) -> &str {
        "raster-transform"
    }

    async fn execute(
        &self,
        task: &ConversionTask<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), ConverterError> {
        let options = task.options;
        let codec = RasterCodec::for_format(task.output_format, options.raster_quality()?)?;
        let resizing = options.width.is_some() || options.height.is_some();

        if !resizing
            && !codec.is_quality_aware()
            && codec_family(task.input_format) == codec_family(task.output_format)
        {
            debug!(
                input = %task.input_path.display(),
                format = task.output_format,
                "Copying image without re-encoding"
            );
            tokio::fs::copy(task.input_path, task.output_path).await?;
            progress.report(90, "Image copied");
            return Ok(());
        }

        progress.report(30, "Decoding image");
        let input: PathBuf = task.input_path.to_path_buf();
        let output: PathBuf = task.output_path.to_path_buf();
        let (width, height, mode) = (options.width, options.height, options.resize.unwrap_or_default());
        let (w, h) =
            blocking(move || transform(&input, &output, codec, width, height, mode)).await?;
        progress.report(90, format!("Encoded {w}x{h} image"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::types::ConversionOptions;
    use crate::testing::fixtures;
    use tempfile::TempDir;

    async fn run(
        input: &Path,
        output: &Path,
        input_format: &str,
        output_format: &str,
        options: &ConversionOptions,
    ) -> Result<(), ConverterError> {
        let task = ConversionTask {
            input_path: input,
            output_path: output,
            input_format,
            output_format,
            options,
        };
        RasterTransform::new()
            .execute(&task, &ProgressReporter::silent())
            .await
    }

    #[test]
    fn test_png_compression_mapping() {
        assert_eq!(png_compression(0), CompressionType::Fast);
        assert_eq!(png_compression(39), CompressionType::Fast);
        assert_eq!(png_compression(50), CompressionType::Default);
        assert_eq!(png_compression(90), CompressionType::Best);
        assert_eq!(png_compression(100), CompressionType::Best);
    }

    #[test]
    fn test_fit_dimensions() {
        assert_eq!(fit_dimensions((1600, 1200), Some(800), None), (800, 600));
        assert_eq!(fit_dimensions((1600, 1200), None, Some(300)), (400, 300));
        assert_eq!(fit_dimensions((1600, 1200), Some(800), Some(100)), (133, 100));
        // Never upscales
        assert_eq!(fit_dimensions((400, 300), Some(800), None), (400, 300));
        assert_eq!(fit_dimensions((400, 300), Some(4000), Some(3000)), (400, 300));
    }

    #[test]
    fn test_codec_selection() {
        assert_eq!(
            RasterCodec::for_format("jpg", 0).unwrap(),
            RasterCodec::Jpeg { quality: 1 }
        );
        assert!(RasterCodec::for_format("png", 90).unwrap().is_quality_aware());
        assert!(!RasterCodec::for_format("webp", 90).unwrap().is_quality_aware());
        assert!(RasterCodec::for_format("heic", 90).is_err());
    }

    #[tokio::test]
    async fn test_jpg_to_png_resized() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("photo.jpg");
        fixtures::write_jpeg(&input, 1600, 1200).unwrap();
        let output = temp.path().join("photo.png");

        let options = ConversionOptions {
            quality: Some(crate::converter::types::QualityOption::Percent(95)),
            width: Some(800),
            ..Default::default()
        };
        run(&input, &output, "jpg", "png", &options).await.unwrap();

        let (w, h) = image::image_dimensions(&output).unwrap();
        assert_eq!((w, h), (800, 600));
        assert_eq!(
            ImageFormat::from_path(&output).unwrap(),
            ImageFormat::Png
        );
    }

    #[tokio::test]
    async fn test_no_upscale() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("small.png");
        fixtures::write_png(&input, 200, 100).unwrap();
        let output = temp.path().join("small.jpg");

        let options = ConversionOptions {
            width: Some(800),
            ..Default::default()
        };
        run(&input, &output, "png", "jpg", &options).await.unwrap();
        assert_eq!(image::image_dimensions(&output).unwrap(), (200, 100));
    }

    #[tokio::test]
    async fn test_cover_crops_to_box() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("wide.png");
        fixtures::write_png(&input, 300, 100).unwrap();
        let output = temp.path().join("square.webp");

        let options = ConversionOptions {
            width: Some(80),
            height: Some(80),
            resize: Some(ResizeMode::Cover),
            ..Default::default()
        };
        run(&input, &output, "png", "webp", &options).await.unwrap();
        assert_eq!(image::image_dimensions(&output).unwrap(), (80, 80));
    }

    #[tokio::test]
    async fn test_same_family_without_quality_encoder_is_copied() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("scan.tif");
        fixtures::write_image(&input, 40, 30, ImageFormat::Tiff).unwrap();
        let output = temp.path().join("scan.tiff");

        run(&input, &output, "tif", "tiff", &ConversionOptions::default())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&input).unwrap(), std::fs::read(&output).unwrap());
    }

    #[tokio::test]
    async fn test_undecodable_input_fails() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("broken.png");
        std::fs::write(&input, b"definitely not a png").unwrap();
        let output = temp.path().join("out.jpg");

        let result = run(&input, &output, "png", "jpg", &ConversionOptions::default()).await;
        assert!(matches!(result, Err(ConverterError::Image(_))));
    }
}
