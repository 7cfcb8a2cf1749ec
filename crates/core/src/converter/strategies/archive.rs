//! Zip-family containers rewritten as plain `.zip`.

use async_trait::async_trait;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use zip::{ZipArchive, ZipWriter};

use super::{blocking, ConversionStrategy};
use crate::converter::error::ConverterError;
use crate::converter::progress::ProgressReporter;
use crate::converter::types::ConversionTask;

/// Copies entries without decompressing them. Returns the entry count.
fn repack(input: &Path, output: &Path) -> Result<usize, ConverterError> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(input)?))?;
    let mut writer = ZipWriter::new(File::create(output)?);

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        writer.raw_copy_file(entry)?;
    }
    writer.finish()?;

    Ok(archive.len())
}

/// Repackages zip, cbz and jar containers into a fresh zip.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchivePassthrough;

impl ArchivePassthrough {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConversionStrategy for ArchivePassthrough {
    fn name(&self) -> &str {
        "archive-passthrough"
    }

    async fn execute(
        &self,
        task: &ConversionTask<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), ConverterError> {
        progress.report(30, "Repacking archive");
        let input = task.input_path.to_path_buf();
        let output = task.output_path.to_path_buf();
        let entries = blocking(move || repack(&input, &output)).await?;
        progress.report(90, format!("Copied {entries} entries"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::types::ConversionOptions;
    use crate::testing::fixtures;
    use std::io::Read;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cbz_repacked_as_zip() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("comic.cbz");
        fixtures::write_zip(
            &input,
            &[("page-01.txt", "first page"), ("page-02.txt", "second page")],
        )
        .unwrap();
        let output = temp.path().join("comic.zip");
        let options = ConversionOptions::default();
        let task = ConversionTask {
            input_path: &input,
            output_path: &output,
            input_format: "cbz",
            output_format: "zip",
            options: &options,
        };

        ArchivePassthrough::new()
            .execute(&task, &ProgressReporter::silent())
            .await
            .unwrap();

        let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut contents = String::new();
        archive
            .by_name("page-02.txt")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "second page");
    }

    #[tokio::test]
    async fn test_corrupt_archive_fails() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("broken.zip");
        std::fs::write(&input, b"PK not really").unwrap();
        let output = temp.path().join("out.zip");
        let options = ConversionOptions::default();
        let task = ConversionTask {
            input_path: &input,
            output_path: &output,
            input_format: "zip",
            output_format: "zip",
            options: &options,
        };

        let err = ArchivePassthrough::new()
            .execute(&task, &ProgressReporter::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::Archive(_)));
    }
}
