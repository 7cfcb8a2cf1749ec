//! Testing utilities: a controllable strategy mock and media fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediaconv_core::testing::{fixtures, MockStrategy};
//!
//! let strategy = MockStrategy::new("mock");
//! strategy.set_progress_steps(vec![25, 50, 75]).await;
//!
//! fixtures::write_png(&dir.join("in.png"), 64, 64)?;
//! ```

mod mock_strategy;

pub use mock_strategy::{MockStrategy, RecordedExecution};

/// Test fixtures and helper functions.
pub mod fixtures {
    use image::{ImageBuffer, ImageFormat, Rgb};
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use crate::converter::ConverterError;

    /// Write a gradient image of the given size in `format`.
    pub fn write_image(
        path: &Path,
        width: u32,
        height: u32,
        format: ImageFormat,
    ) -> Result<(), ConverterError> {
        let image = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ])
        });
        image.save_with_format(path, format)?;
        Ok(())
    }

    /// Write a PNG test image.
    pub fn write_png(path: &Path, width: u32, height: u32) -> Result<(), ConverterError> {
        write_image(path, width, height, ImageFormat::Png)
    }

    /// Write a JPEG test image.
    pub fn write_jpeg(path: &Path, width: u32, height: u32) -> Result<(), ConverterError> {
        write_image(path, width, height, ImageFormat::Jpeg)
    }

    /// Write a one-page PDF with `text` set in Courier.
    pub fn write_text_pdf(path: &Path, text: &str) -> Result<(), ConverterError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
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
        doc.save(path)?;
        Ok(())
    }

    /// Write a zip archive with the given (name, contents) entries.
    pub fn write_zip(path: &Path, entries: &[(&str, &str)]) -> Result<(), ConverterError> {
        let mut writer = ZipWriter::new(File::create(path)?);
        for (name, contents) in entries {
            writer.start_file(*name, SimpleFileOptions::default())?;
            writer.write_all(contents.as_bytes())?;
        }
        writer.finish()?;
        Ok(())
    }
}
