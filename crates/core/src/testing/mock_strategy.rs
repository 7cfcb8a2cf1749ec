//! Mock conversion strategy for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::converter::{ConversionStrategy, ConversionTask, ConverterError, ProgressReporter};

/// A recorded strategy execution for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedExecution {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub input_format: String,
    pub output_format: String,
    /// Whether the execution succeeded.
    pub success: bool,
}

/// Mock implementation of the ConversionStrategy trait.
///
/// Provides controllable behavior for testing:
/// - Track executions for assertions
/// - Write configurable output bytes (or nothing)
/// - Simulate failure after a partial write
/// - Emit a scripted progress sequence
///
/// # Example
///
/// ```rust,ignore
/// use mediaconv_core::testing::MockStrategy;
///
/// let strategy = MockStrategy::new("first");
/// strategy.set_next_error(ConverterError::invalid_option("width", "zero")).await;
///
/// let table = CapabilityTable::new().with(CapabilityDescriptor::new(&["png"], &["jpg"], strategy.clone()));
/// ```
#[derive(Debug, Clone)]
pub struct MockStrategy {
    name: String,
    /// Recorded executions.
    executions: Arc<RwLock<Vec<RecordedExecution>>>,
    /// If set, the next execution writes partial output and fails with this error.
    next_error: Arc<RwLock<Option<ConverterError>>>,
    /// Bytes written on success. `None` writes nothing.
    output: Arc<RwLock<Option<Vec<u8>>>>,
    /// Progress values reported before writing.
    progress_steps: Arc<RwLock<Vec<u8>>>,
    /// Simulated work time.
    delay: Arc<RwLock<Duration>>,
}

impl MockStrategy {
    /// Create a mock that writes a small payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executions: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            output: Arc::new(RwLock::new(Some(b"mock output".to_vec()))),
            progress_steps: Arc::new(RwLock::new(vec![30, 60, 90])),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    /// Get all recorded executions.
    pub async fn recorded_executions(&self) -> Vec<RecordedExecution> {
        self.executions.read().await.clone()
    }

    /// Get the number of executions performed.
    pub async fn execution_count(&self) -> usize {
        self.executions.read().await.len()
    }

    /// Configure the next execution to fail with the given error.
    pub async fn set_next_error(&self, error: ConverterError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the bytes written on success. `None` succeeds without writing.
    pub async fn set_output(&self, output: Option<Vec<u8>>) {
        *self.output.write().await = output;
    }

    /// Set the progress values reported during execution.
    pub async fn set_progress_steps(&self, steps: Vec<u8>) {
        *self.progress_steps.write().await = steps;
    }

    /// Set the simulated execution time.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    async fn record(&self, task: &ConversionTask<'_>, success: bool) {
        self.executions.write().await.push(RecordedExecution {
            input_path: task.input_path.to_path_buf(),
            output_path: task.output_path.to_path_buf(),
            input_format: task.input_format.to_string(),
            output_format: task.output_format.to_string(),
            success,
        });
    }
}

#[async_trait]
impl ConversionStrategy for MockStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        task: &ConversionTask<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), ConverterError> {
        let steps = self.progress_steps.read().await.clone();
        let delay = *self.delay.read().await;
        for percent in steps {
            progress.report(percent, format!("{} at {percent}%", self.name));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if let Some(err) = self.next_error.write().await.take() {
            // Leave a partial artifact behind for the facade to clean up.
            tokio::fs::write(task.output_path, b"partial").await?;
            self.record(task, false).await;
            return Err(err);
        }

        if let Some(bytes) = self.output.read().await.as_ref() {
            tokio::fs::write(task.output_path, bytes).await?;
        }
        self.record(task, true).await;
        Ok(())
    }
}
