//! Progress reporting.
//!
//! Strategies and the process runner never talk to the caller's sink directly.
//! They go through a [`ProgressReporter`], which keeps the percent sequence
//! non-decreasing and reserves 100 for [`ProgressReporter::complete`].

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::types::ConversionProgress;

/// Highest percent a running conversion may report.
const RUNNING_CEILING: u8 = 99;

/// Receiver of progress events.
///
/// Called synchronously from the stream-reading path, so implementations must
/// be cheap and must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: ConversionProgress);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn emit(&self, _progress: ConversionProgress) {}
}

impl ProgressSink for mpsc::UnboundedSender<ConversionProgress> {
    fn emit(&self, progress: ConversionProgress) {
        // Receiver gone means nobody is listening any more.
        let _ = self.send(progress);
    }
}

/// Bounded channels drop events when full instead of stalling the conversion.
impl ProgressSink for mpsc::Sender<ConversionProgress> {
    fn emit(&self, progress: ConversionProgress) {
        let _ = self.try_send(progress);
    }
}

/// Per-conversion wrapper around a [`ProgressSink`].
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    last: AtomicU8,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            last: AtomicU8::new(0),
        }
    }

    /// Reporter that goes nowhere.
    pub fn silent() -> Self {
        Self::new(Arc::new(NoopProgress))
    }

    /// Reports progress. Values below the last report are raised to it and
    /// values above 99 are capped.
    pub fn report(&self, percent: u8, message: impl Into<String>) {
        let capped = percent.min(RUNNING_CEILING);
        let previous = self.last.fetch_max(capped, Ordering::SeqCst);
        self.sink.emit(ConversionProgress {
            percent: previous.max(capped),
            message: message.into(),
        });
    }

    /// Reports 100. Only the conversion facade calls this, after verification.
    pub(crate) fn complete(&self, message: impl Into<String>) {
        self.last.store(100, Ordering::SeqCst);
        self.sink.emit(ConversionProgress {
            percent: 100,
            message: message.into(),
        });
    }

    /// The highest percent reported so far.
    pub fn last_percent(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("last", &self.last_percent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ConversionProgress>) -> Vec<u8> {
        let mut percents = Vec::new();
        while let Ok(event) = rx.try_recv() {
            percents.push(event.percent);
        }
        percents
    }

    #[test]
    fn test_report_is_monotonic() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter = ProgressReporter::new(Arc::new(tx));

        reporter.report(10, "setup");
        reporter.report(50, "halfway");
        reporter.report(30, "late marker");
        reporter.report(60, "more");

        assert_eq!(drain(&mut rx), vec![10, 50, 50, 60]);
        assert_eq!(reporter.last_percent(), 60);
    }

    #[test]
    fn test_report_never_reaches_100() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter = ProgressReporter::new(Arc::new(tx));

        reporter.report(100, "claims done");
        assert_eq!(drain(&mut rx), vec![99]);

        reporter.complete("done");
        let events: Vec<u8> = drain(&mut rx);
        assert_eq!(events, vec![100]);
    }

    #[test]
    fn test_bounded_sender_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let reporter = ProgressReporter::new(Arc::new(tx));

        reporter.report(10, "first");
        reporter.report(20, "dropped");

        assert_eq!(rx.try_recv().unwrap().percent, 10);
        assert!(rx.try_recv().is_err());
        assert_eq!(reporter.last_percent(), 20);
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let reporter = ProgressReporter::new(Arc::new(tx));
        reporter.report(40, "nobody listening");
        assert_eq!(reporter.last_percent(), 40);
    }
}
