//! External process execution with progress estimation.

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::error::ConverterError;
use super::progress::ProgressReporter;
use super::types::{ProcessInvocation, ProgressWindow};

/// Progress band owned by the running process. Below is setup, above is
/// finalization.
const PROCESS_BAND_START: f64 = 20.0;
const PROCESS_BAND_END: f64 = 95.0;

/// Stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").expect("valid duration regex")
});

static ELAPSED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"time=\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").expect("valid elapsed regex")
});

fn captured_seconds(caps: &Captures<'_>) -> Option<f64> {
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Turns transcoder diagnostic lines into a percent in the process band.
#[derive(Debug, Default)]
pub struct ProgressParser {
    total_secs: Option<f64>,
    window: ProgressWindow,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser for a process that only covers part of its input.
    pub fn with_window(window: ProgressWindow) -> Self {
        Self {
            total_secs: None,
            window,
        }
    }

    /// Seconds the process is expected to cover, once known.
    pub fn total_secs(&self) -> Option<f64> {
        self.total_secs.or(self.window.length)
    }

    /// Feeds one line. Returns a percent when the line carries an elapsed
    /// marker and the total duration is known.
    pub fn observe(&mut self, line: &str) -> Option<u8> {
        if self.total_secs.is_none() {
            if let Some(input_secs) = DURATION_RE
                .captures(line)
                .and_then(|caps| captured_seconds(&caps))
            {
                let mut covered = input_secs - self.window.offset;
                if let Some(length) = self.window.length {
                    covered = covered.min(length);
                }
                if covered > 0.0 {
                    self.total_secs = Some(covered);
                }
                return None;
            }
        }

        let elapsed = ELAPSED_RE
            .captures(line)
            .and_then(|caps| captured_seconds(&caps))?;
        let total = self.total_secs().filter(|t| *t > 0.0)?;

        let fraction = (elapsed / total).clamp(0.0, 1.0);
        let percent = PROCESS_BAND_START + fraction * (PROCESS_BAND_END - PROCESS_BAND_START);
        Some(percent.clamp(PROCESS_BAND_START, PROCESS_BAND_END) as u8)
    }
}

/// Splits buffered bytes into complete records terminated by `\n` or `\r`.
fn drain_records(pending: &mut Vec<u8>) -> Vec<String> {
    let mut records = Vec::new();
    while let Some(pos) = pending.iter().position(|b| *b == b'\n' || *b == b'\r') {
        let record: Vec<u8> = pending.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&record[..record.len() - 1]);
        if !text.trim().is_empty() {
            records.push(text.into_owned());
        }
    }
    records
}

/// Spawns external binaries and turns their stderr into progress events.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    permits: Arc<Semaphore>,
}

impl ProcessRunner {
    /// Creates a runner that allows at most `max_parallel` processes at once.
    pub fn new(max_parallel: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_parallel.max(1))),
        }
    }

    /// Permits currently free.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Runs the invocation to completion.
    pub async fn run(
        &self,
        invocation: &ProcessInvocation,
        progress: &ProgressReporter,
    ) -> Result<(), ConverterError> {
        let _permit = self.permits.acquire().await.map_err(|_| {
            ConverterError::Io(std::io::Error::other("process admission closed"))
        })?;

        debug!(
            program = %invocation.program.display(),
            args = ?invocation.args,
            "Spawning external process"
        );

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConverterError::ProcessSpawn {
                program: invocation.program.clone(),
                source,
            })?;

        let mut stderr = child.stderr.take().ok_or_else(|| {
            ConverterError::Io(std::io::Error::other("stderr was not captured"))
        })?;

        let mut parser = ProgressParser::with_window(invocation.window);
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut pending = Vec::new();
        let mut chunk = [0u8; 4096];
        let mut last_percent = None;

        let mut handle_record = |record: String, tail: &mut VecDeque<String>| {
            if let Some(percent) = parser.observe(&record) {
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    progress.report(percent, format!("Processing ({percent}%)"));
                }
            }
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(record);
        };

        loop {
            let read = stderr.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            pending.extend_from_slice(&chunk[..read]);
            for record in drain_records(&mut pending) {
                handle_record(record, &mut tail);
            }
        }
        if !pending.is_empty() {
            let record = String::from_utf8_lossy(&pending).into_owned();
            handle_record(record, &mut tail);
        }

        let status = child.wait().await?;
        if status.success() {
            return Ok(());
        }

        warn!(
            program = %invocation.program.display(),
            code = ?status.code(),
            "External process failed"
        );
        let stderr_tail = Vec::from(tail).join("\n");
        Err(ConverterError::ProcessExecution {
            program: invocation.program.clone(),
            code: status.code(),
            stderr: if stderr_tail.is_empty() {
                None
            } else {
                Some(stderr_tail)
            },
        })
    }
}
