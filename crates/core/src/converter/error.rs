//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the router, strategies, process runner and output manager.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// No capability descriptor accepts the format pair.
    #[error("Unsupported conversion: {input_format} to {output_format}")]
    UnsupportedConversion {
        input_format: String,
        output_format: String,
    },

    /// Source image encoding cannot be embedded into a document.
    #[error("Cannot embed {format} images into a document (only JPEG and PNG)")]
    UnsupportedEmbedFormat { format: String },

    /// External binary could not be launched.
    #[error("Failed to launch {program}: {source}")]
    ProcessSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External binary ran and exited unsuccessfully.
    #[error(
        "{program} exited with {}",
        .code.map(|c| format!("code {c}")).unwrap_or_else(|| "a signal".to_string())
    )]
    ProcessExecution {
        program: PathBuf,
        code: Option<i32>,
        stderr: Option<String>,
    },

    /// Strategy reported success but no usable output exists.
    #[error("Output file missing or empty: {path}")]
    OutputVerification { path: PathBuf },

    /// A conversion option has a malformed value.
    #[error("Invalid option {name}: {reason}")]
    InvalidOption { name: String, reason: String },

    /// Document contains no text layer to extract.
    #[error("No extractable text in {path}")]
    NoExtractableText { path: PathBuf },

    /// Raster decode or encode failure.
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    /// PDF read or write failure.
    #[error("Document processing failed: {0}")]
    Document(#[from] lopdf::Error),

    /// Archive read or write failure.
    #[error("Archive processing failed: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConverterError {
    /// Creates an unsupported conversion error.
    pub fn unsupported(input_format: impl Into<String>, output_format: impl Into<String>) -> Self {
        Self::UnsupportedConversion {
            input_format: input_format.into(),
            output_format: output_format.into(),
        }
    }

    /// Creates an invalid option error.
    pub fn invalid_option(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Exit code of a failed external process, if this is one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ProcessExecution { code, .. } => *code,
            _ => None,
        }
    }
}

/// Errors returned by [`ConversionEngine`](super::ConversionEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Format pair is not in the capability table. Nothing was written.
    #[error("Unsupported conversion: {input_format} to {output_format}")]
    UnsupportedConversion {
        input_format: String,
        output_format: String,
    },

    /// Input file does not exist. Nothing was written.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The strategy, process or verification step failed.
    #[error("Conversion failed: {source}")]
    ConversionFailed {
        #[source]
        source: ConverterError,
    },
}

impl EngineError {
    /// Wraps a strategy-level failure.
    pub fn conversion_failed(source: ConverterError) -> Self {
        Self::ConversionFailed { source }
    }

    /// The underlying strategy-level error, if any.
    pub fn cause(&self) -> Option<&ConverterError> {
        match self {
            Self::ConversionFailed { source } => Some(source),
            _ => None,
        }
    }
}

impl From<ConverterError> for EngineError {
    fn from(err: ConverterError) -> Self {
        match err {
            ConverterError::UnsupportedConversion {
                input_format,
                output_format,
            } => Self::UnsupportedConversion {
                input_format,
                output_format,
            },
            other => Self::conversion_failed(other),
        }
    }
}
