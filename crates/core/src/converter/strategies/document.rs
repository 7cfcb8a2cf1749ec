//! Document strategies: image to PDF, PDF text extraction and first-page
//! rendering.

use async_trait::async_trait;
use image::codecs::jpeg::JpegDecoder;
use image::ImageDecoder;
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{blocking, ConversionStrategy};
use crate::converter::config::EngineConfig;
use crate::converter::error::ConverterError;
use crate::converter::progress::ProgressReporter;
use crate::converter::runner::ProcessRunner;
use crate::converter::types::{ConversionTask, ProcessInvocation};

const PDF_VERSION: &str = "1.5";

/// Pixel data ready to be placed in an image XObject.
struct EmbeddedImage {
    width: u32,
    height: u32,
    color_space: &'static str,
    stream: Stream,
}

impl EmbeddedImage {
    /// JPEG bytes are embedded as-is behind a DCT filter, so the colour
    /// space must match the components actually stored in the stream.
    fn jpeg(bytes: Vec<u8>) -> Result<Self, ConverterError> {
        let (width, height) = JpegDecoder::new(Cursor::new(&bytes))?.dimensions();
        let mut dict = dictionary! {
            "Filter" => "DCTDecode",
        };
        let color_space = match jpeg_components(&bytes) {
            Some(1) => "DeviceGray",
            Some(3) => "DeviceRGB",
            // Adobe writes CMYK JPEGs inverted.
            Some(4) => {
                let decode: Vec<Object> = [1, 0, 1, 0, 1, 0, 1, 0]
                    .into_iter()
                    .map(Object::Integer)
                    .collect();
                dict.set("Decode", decode);
                "DeviceCMYK"
            }
            other => {
                return Err(ConverterError::UnsupportedEmbedFormat {
                    format: match other {
                        Some(n) => format!("{n}-component JPEG"),
                        None => "malformed JPEG".to_string(),
                    },
                })
            }
        };
        let stream = Stream::new(dict, bytes).with_compression(false);
        Ok(Self {
            width,
            height,
            color_space,
            stream,
        })
    }

    /// PNG is decoded to 8-bit RGB samples and flate-compressed on save.
    fn png(bytes: &[u8]) -> Result<Self, ConverterError> {
        let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?;
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self {
            width,
            height,
            color_space: "DeviceRGB",
            stream: Stream::new(lopdf::Dictionary::new(), rgb.into_raw()),
        })
    }
}

/// Component count from the first start-of-frame segment.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if bytes.get(..2)? != [0xFF, 0xD8].as_slice() {
        return None;
    }
    let mut pos = 2;
    loop {
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(pos + 1)?;
        match marker {
            0xFF => {
                pos += 1;
                continue;
            }
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let length = usize::from(u16::from_be_bytes([*bytes.get(pos + 2)?, *bytes.get(pos + 3)?]));
        // SOF0..SOF15, skipping DHT, JPG and DAC which share the range.
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            return bytes.get(pos + 9).copied();
        }
        pos += 2 + length;
    }
}

/// Builds a single-page PDF whose page is exactly the image size.
fn build_document(image: EmbeddedImage, output: &Path) -> Result<(), ConverterError> {
    let EmbeddedImage {
        width,
        height,
        color_space,
        mut stream,
    } = image;
    let (w, h) = (i64::from(width), i64::from(height));

    let mut doc = Document::with_version(PDF_VERSION);
    let pages_id = doc.new_object_id();

    stream.dict.set("Type", Object::Name(b"XObject".to_vec()));
    stream.dict.set("Subtype", Object::Name(b"Image".to_vec()));
    stream.dict.set("Width", w);
    stream.dict.set("Height", h);
    stream
        .dict
        .set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
    stream.dict.set("BitsPerComponent", 8i64);
    let image_id = doc.add_object(stream);

    let content = format!("q\n{w} 0 0 {h} 0 0 cm\n/Im0 Do\nQ\n");
    let content_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    });

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();
    doc.save(output)?;
    Ok(())
}

fn embed_image(input: &Path, input_format: &str, output: &Path) -> Result<(), ConverterError> {
    let embedded = match input_format {
        "jpg" | "jpeg" => EmbeddedImage::jpeg(std::fs::read(input)?)?,
        "png" => EmbeddedImage::png(&std::fs::read(input)?)?,
        other => {
            return Err(ConverterError::UnsupportedEmbedFormat {
                format: other.to_string(),
            })
        }
    };
    build_document(embedded, output)
}

/// Wraps a JPEG or PNG image into a one-page PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageToDocument;

impl ImageToDocument {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConversionStrategy for ImageToDocument {
    fn name(&self) -> &str {
        "image-to-document"
    }

    async fn execute(
        &self,
        task: &ConversionTask<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), ConverterError> {
        progress.report(30, "Embedding image");
        let input = task.input_path.to_path_buf();
        let output = task.output_path.to_path_buf();
        let format = task.input_format.to_string();
        blocking(move || embed_image(&input, &format, &output)).await?;
        progress.report(90, "Document written");
        Ok(())
    }
}

fn extract_text(input: &Path, output: &Path) -> Result<usize, ConverterError> {
    let doc = Document::load(input)?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    let text = if pages.is_empty() {
        String::new()
    } else {
        doc.extract_text(&pages)?
    };

    if text.trim().is_empty() {
        return Err(ConverterError::NoExtractableText {
            path: input.to_path_buf(),
        });
    }
    std::fs::write(output, text.as_bytes())?;
    Ok(pages.len())
}

/// Writes the text layer of every page to a UTF-8 text file.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentToText;

impl DocumentToText {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConversionStrategy for DocumentToText {
    fn name(&self) -> &str {
        "document-to-text"
    }

    async fn execute(
        &self,
        task: &ConversionTask<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), ConverterError> {
        progress.report(30, "Extracting text");
        let input = task.input_path.to_path_buf();
        let output = task.output_path.to_path_buf();
        let pages = blocking(move || extract_text(&input, &output)).await?;
        progress.report(90, format!("Extracted text from {pages} page(s)"));
        Ok(())
    }
}

/// Renders the first page of a PDF with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct DocumentToImage {
    program: PathBuf,
    dpi: u32,
    runner: ProcessRunner,
}

impl DocumentToImage {
    pub fn new(program: impl Into<PathBuf>, dpi: u32, runner: ProcessRunner) -> Self {
        Self {
            program: program.into(),
            dpi,
            runner,
        }
    }

    pub fn from_config(config: &EngineConfig, runner: ProcessRunner) -> Self {
        Self::new(&config.pdftoppm_path, config.document_dpi, runner)
    }

    /// pdftoppm appends its own extension to the output prefix.
    fn rendered_path(task: &ConversionTask<'_>) -> PathBuf {
        let extension = if task.output_format == "png" { "png" } else { "jpg" };
        task.output_path.with_extension(extension)
    }

    pub fn build(&self, task: &ConversionTask<'_>) -> Result<ProcessInvocation, ConverterError> {
        let mut args = vec![
            "-singlefile".to_string(),
            "-f".to_string(),
            "1".to_string(),
            "-l".to_string(),
            "1".to_string(),
            "-r".to_string(),
            self.dpi.to_string(),
        ];
        match task.output_format {
            "png" => args.push("-png".to_string()),
            "jpg" | "jpeg" => {
                let quality = task.options.raster_quality()?;
                args.extend([
                    "-jpeg".to_string(),
                    "-jpegopt".to_string(),
                    format!("quality={}", quality.max(1)),
                ]);
            }
            other => return Err(ConverterError::unsupported(task.input_format, other)),
        }
        args.push(task.input_path.to_string_lossy().to_string());
        args.push(
            task.output_path
                .with_extension("")
                .to_string_lossy()
                .to_string(),
        );
        Ok(ProcessInvocation::new(&self.program, args))
    }
}

#[async_trait]
impl ConversionStrategy for DocumentToImage {
    fn name(&self) -> &str {
        "document-to-image"
    }

    async fn execute(
        &self,
        task: &ConversionTask<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), ConverterError> {
        let invocation = self.build(task)?;
        let rendered = Self::rendered_path(task);
        progress.report(15, "Rendering first page");
        if let Err(e) = self.runner.run(&invocation, progress).await {
            remove_stray(&rendered, task.output_path).await;
            return Err(e);
        }

        if rendered != task.output_path {
            debug!(
                from = %rendered.display(),
                to = %task.output_path.display(),
                "Renaming rendered page"
            );
            if let Err(e) = tokio::fs::rename(&rendered, task.output_path).await {
                remove_stray(&rendered, task.output_path).await;
                return Err(e.into());
            }
        }
        progress.report(90, "Page rendered");
        Ok(())
    }
}

/// Deletes a page pdftoppm wrote under its own extension. The facade only
/// knows about `output`, so nothing else would clean it up.
async fn remove_stray(rendered: &Path, output: &Path) {
    if rendered == output {
        return;
    }
    match tokio::fs::remove_file(rendered).await {
        Ok(()) => debug!(path = %rendered.display(), "Removed partial page"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            path = %rendered.display(),
            error = %e,
            "Failed to remove partial page"
        ),
    }
}
