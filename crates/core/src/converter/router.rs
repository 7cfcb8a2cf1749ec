//! Format normalization and strategy lookup.

use std::path::Path;
use std::sync::Arc;

use super::capabilities::CapabilityTable;
use super::error::ConverterError;
use super::strategies::ConversionStrategy;

/// Lowercases a format token and strips surrounding whitespace and a leading
/// dot, so `" .PNG"` and `"png"` are the same format.
pub fn normalize_format(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_lowercase()
}

/// Format of a file, taken from its extension. Empty when there is none.
pub fn format_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_format)
        .unwrap_or_default()
}

/// Resolves conversion strategies from an ordered capability table.
#[derive(Debug, Clone)]
pub struct FormatRouter {
    table: CapabilityTable,
}

impl FormatRouter {
    pub fn new(table: CapabilityTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &CapabilityTable {
        &self.table
    }

    /// First descriptor accepting the pair wins.
    pub fn resolve(
        &self,
        input_format: &str,
        output_format: &str,
    ) -> Result<Arc<dyn ConversionStrategy>, ConverterError> {
        let input = normalize_format(input_format);
        let output = normalize_format(output_format);

        self.table
            .descriptors()
            .iter()
            .find(|d| d.accepts(&input, &output))
            .map(|d| Arc::clone(&d.strategy))
            .ok_or_else(|| ConverterError::unsupported(input, output))
    }

    /// Whether any descriptor accepts the pair.
    pub fn supports(&self, input_format: &str, output_format: &str) -> bool {
        self.resolve(input_format, output_format).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::capabilities::CapabilityDescriptor;
    use crate::converter::config::EngineConfig;
    use crate::converter::runner::ProcessRunner;
    use crate::testing::MockStrategy;

    fn standard() -> FormatRouter {
        FormatRouter::new(CapabilityTable::standard(
            &EngineConfig::default(),
            ProcessRunner::new(1),
        ))
    }

    #[test]
    fn test_normalize_format() {
        assert_eq!(normalize_format(".PNG"), "png");
        assert_eq!(normalize_format("  Jpeg "), "jpeg");
        assert_eq!(normalize_format("mp4"), "mp4");
    }

    #[test]
    fn test_format_of() {
        assert_eq!(format_of(Path::new("/uploads/Holiday.JPG")), "jpg");
        assert_eq!(format_of(Path::new("/uploads/archive.tar.gz")), "gz");
        assert_eq!(format_of(Path::new("/uploads/README")), "");
    }

    #[test]
    fn test_resolves_standard_pairs() {
        let router = standard();
        assert_eq!(router.resolve("mp4", "gif").unwrap().name(), "video-to-gif");
        assert_eq!(router.resolve("MOV", ".mp4").unwrap().name(), "video-transcode");
        assert_eq!(router.resolve("mkv", "flac").unwrap().name(), "audio-extract");
        assert_eq!(router.resolve("wav", "ogg").unwrap().name(), "audio-transcode");
        assert_eq!(router.resolve("gif", "png").unwrap().name(), "raster-transform");
        assert_eq!(router.resolve("png", "pdf").unwrap().name(), "image-to-document");
        assert_eq!(router.resolve("pdf", "jpg").unwrap().name(), "document-to-image");
        assert_eq!(router.resolve("pdf", "txt").unwrap().name(), "document-to-text");
        assert_eq!(router.resolve("jar", "zip").unwrap().name(), "archive-passthrough");
    }

    #[test]
    fn test_unsupported_pair() {
        let router = standard();
        let err = router.resolve("mp3", "mp4").err().unwrap();
        match err {
            ConverterError::UnsupportedConversion {
                input_format,
                output_format,
            } => {
                assert_eq!(input_format, "mp3");
                assert_eq!(output_format, "mp4");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!router.supports("png", "tif"));
        assert!(!router.supports("", "png"));
    }

    #[test]
    fn test_first_match_wins() {
        let table = CapabilityTable::new()
            .with(CapabilityDescriptor::new(
                &["png"],
                &["jpg"],
                MockStrategy::new("first"),
            ))
            .with(CapabilityDescriptor::new(
                &["png", "gif"],
                &["jpg"],
                MockStrategy::new("second"),
            ));
        let router = FormatRouter::new(table);

        assert_eq!(router.resolve("png", "jpg").unwrap().name(), "first");
        assert_eq!(router.resolve("gif", "jpg").unwrap().name(), "second");
    }
}
