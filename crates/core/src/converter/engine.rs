//! Conversion facade.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tracing::{info, warn};

use super::capabilities::CapabilityTable;
use super::config::EngineConfig;
use super::error::{ConverterError, EngineError};
use super::output::OutputManager;
use super::progress::{NoopProgress, ProgressReporter, ProgressSink};
use super::router::{format_of, normalize_format, FormatRouter};
use super::runner::ProcessRunner;
use super::types::{ConversionRequest, ConversionResult, ConversionTask};

/// Public entry point: routes a request to a strategy, owns the output file
/// until it is verified and relays progress.
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    router: FormatRouter,
    output: OutputManager,
    config: EngineConfig,
}

impl ConversionEngine {
    /// Engine with the standard capability table.
    pub fn new(config: &EngineConfig) -> Self {
        let runner = ProcessRunner::new(config.max_parallel_processes);
        Self::with_table(config, CapabilityTable::standard(config, runner))
    }

    /// Engine with a custom capability table.
    pub fn with_table(config: &EngineConfig, table: CapabilityTable) -> Self {
        Self {
            router: FormatRouter::new(table),
            output: OutputManager::new(&config.output_dir),
            config: config.clone(),
        }
    }

    pub fn router(&self) -> &FormatRouter {
        &self.router
    }

    pub fn output_dir(&self) -> &Path {
        self.output.output_dir()
    }

    /// Output formats reachable from an input format.
    pub fn supported_outputs(&self, input_format: &str) -> Vec<&'static str> {
        self.router
            .table()
            .outputs_for(&normalize_format(input_format))
    }

    /// Every (input, output, strategy name) the table declares.
    pub fn pairs(&self) -> Vec<(&'static str, &'static str, &str)> {
        self.router.table().pairs()
    }

    /// Checks that ffmpeg and pdftoppm run and the output directory is
    /// writable.
    pub async fn validate(&self) -> Result<(), ConverterError> {
        probe(&self.config.ffmpeg_path, "-version").await?;
        probe(&self.config.pdftoppm_path, "-v").await?;
        tokio::fs::create_dir_all(self.output.output_dir()).await?;
        Ok(())
    }

    /// Converts without progress reporting.
    pub async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionResult, EngineError> {
        self.convert_with_progress(request, Arc::new(NoopProgress))
            .await
    }

    /// Converts, relaying progress to `sink`. The percent sequence never
    /// decreases and reaches 100 only when a verified output exists.
    pub async fn convert_with_progress(
        &self,
        request: ConversionRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<ConversionResult, EngineError> {
        let start = Instant::now();
        let input_format = format_of(&request.input_path);
        let output_format = normalize_format(&request.target_format);

        let strategy = self.router.resolve(&input_format, &output_format)?;

        match tokio::fs::metadata(&request.input_path).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                return Err(EngineError::InputNotFound {
                    path: request.input_path,
                })
            }
        }

        info!(
            input = %request.input_path.display(),
            from = %input_format,
            to = %output_format,
            strategy = strategy.name(),
            "Starting conversion"
        );

        let progress = ProgressReporter::new(sink);
        progress.report(0, "Starting conversion");

        let output_path = self
            .output
            .prepare_path(&output_format)
            .await
            .map_err(EngineError::conversion_failed)?;
        progress.report(10, "Output prepared");

        let task = ConversionTask {
            input_path: &request.input_path,
            output_path: &output_path,
            input_format: &input_format,
            output_format: &output_format,
            options: &request.options,
        };

        if let Err(e) = strategy.execute(&task, &progress).await {
            warn!(
                input = %request.input_path.display(),
                strategy = strategy.name(),
                error = %e,
                "Conversion failed"
            );
            self.output.discard(&output_path).await;
            return Err(EngineError::conversion_failed(e));
        }

        progress.report(95, "Finalizing");
        let output_size_bytes = match self.output.verify(&output_path).await {
            Ok(size) => size,
            Err(e) => {
                warn!(path = %output_path.display(), "Strategy produced no usable output");
                self.output.discard(&output_path).await;
                return Err(EngineError::conversion_failed(e));
            }
        };

        let file_name = output_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let duration_ms = start.elapsed().as_millis() as u64;
        progress.complete("Conversion complete");

        info!(
            output = %output_path.display(),
            size = output_size_bytes,
            duration_ms,
            "Conversion complete"
        );

        Ok(ConversionResult {
            output_path,
            file_name,
            input_format,
            output_format,
            output_size_bytes,
            duration_ms,
        })
    }
}

/// Runs `program flag` and requires a zero exit.
async fn probe(program: &Path, flag: &str) -> Result<(), ConverterError> {
    let status = Command::new(program)
        .arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|source| ConverterError::ProcessSpawn {
            program: program.to_path_buf(),
            source,
        })?;

    if !status.success() {
        return Err(ConverterError::ProcessExecution {
            program: program.to_path_buf(),
            code: status.code(),
            stderr: None,
        });
    }
    Ok(())
}
