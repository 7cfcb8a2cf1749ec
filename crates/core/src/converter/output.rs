//! Output file ownership: naming, verification and cleanup.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::ConverterError;

/// Hex characters of randomness in each generated file name.
const TOKEN_LEN: usize = 16;

/// Owns candidate output files until they are verified.
#[derive(Debug, Clone)]
pub struct OutputManager {
    output_dir: PathBuf,
}

impl OutputManager {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Directory outputs are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Builds a fresh `<timestamp>-<token>.<extension>` file name.
    pub fn file_name(extension: &str) -> String {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let token = Uuid::new_v4().simple().to_string();
        format!("{}-{}.{}", timestamp, &token[..TOKEN_LEN], extension)
    }

    /// Creates the output directory if needed and returns an unused path.
    pub async fn prepare_path(&self, extension: &str) -> Result<PathBuf, ConverterError> {
        fs::create_dir_all(&self.output_dir).await?;
        Ok(self.output_dir.join(Self::file_name(extension)))
    }

    /// Confirms the file exists, is a regular file and is non-empty.
    /// Returns its size.
    pub async fn verify(&self, path: &Path) -> Result<u64, ConverterError> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
            _ => Err(ConverterError::OutputVerification {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Deletes a partial artifact. Never fails.
    pub async fn discard(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Discarded partial output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "Failed to discard partial output"
            ),
        }
    }
}
