//! Age-based deletion of temporary files.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::config::RetentionConfig;

/// Outcome of sweeping one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectorySweep {
    pub directory: PathBuf,
    /// Files deleted.
    pub removed: usize,
    /// Entries that could not be inspected or deleted.
    pub failed: usize,
    /// Set when the directory itself could not be listed.
    pub error: Option<String>,
}

impl DirectorySweep {
    fn new(directory: &Path) -> Self {
        Self {
            directory: directory.to_path_buf(),
            ..Default::default()
        }
    }
}

/// Outcome of one sweep over every configured directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub directories: Vec<DirectorySweep>,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.directories.iter().map(|d| d.removed).sum()
    }

    pub fn failed(&self) -> usize {
        self.directories.iter().map(|d| d.failed).sum()
    }
}

/// Deletes regular files older than `max_age` directly inside each directory.
///
/// Subdirectories are left alone. Errors are logged and counted per
/// directory and never stop the remaining directories from being swept.
pub async fn sweep(directories: &[PathBuf], max_age: Duration) -> SweepReport {
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut report = SweepReport::default();
    for directory in directories {
        report
            .directories
            .push(sweep_directory(directory, cutoff).await);
    }
    report
}

async fn sweep_directory(directory: &Path, cutoff: SystemTime) -> DirectorySweep {
    let mut result = DirectorySweep::new(directory);

    let mut entries = match fs::read_dir(directory).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %directory.display(), "Sweep directory does not exist");
            return result;
        }
        Err(e) => {
            warn!(dir = %directory.display(), error = %e, "Failed to list sweep directory");
            result.error = Some(e.to_string());
            return result;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %directory.display(), error = %e, "Failed to read directory entry");
                result.failed += 1;
                break;
            }
        };
        let path = entry.path();

        let modified = match entry.metadata().await {
            Ok(meta) if !meta.is_file() => continue,
            Ok(meta) => meta.modified(),
            Err(e) => Err(e),
        };
        let modified = match modified {
            Ok(modified) => modified,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to stat file");
                result.failed += 1;
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed expired file");
                result.removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove expired file");
                result.failed += 1;
            }
        }
    }

    if result.removed > 0 || result.failed > 0 {
        info!(
            dir = %directory.display(),
            removed = result.removed,
            failed = result.failed,
            "Swept directory"
        );
    }
    result
}

/// Sweeps a fixed set of directories, once or on an interval.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    directories: Vec<PathBuf>,
    max_age: Duration,
}

impl RetentionSweeper {
    pub fn new(directories: Vec<PathBuf>, max_age: Duration) -> Self {
        Self {
            directories,
            max_age,
        }
    }

    pub fn from_config(config: &RetentionConfig) -> Self {
        Self::new(config.directories.clone(), config.max_age())
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    pub async fn run_once(&self) -> SweepReport {
        sweep(&self.directories, self.max_age).await
    }

    /// Sweeps immediately and then every `interval` until `shutdown` fires
    /// or its sender is dropped.
    pub async fn run_periodic(&self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            directories = self.directories.len(),
            max_age_secs = self.max_age.as_secs(),
            interval_secs = interval.as_secs(),
            "Retention sweeper started"
        );
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Retention sweeper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.run_once().await;
                    debug!(removed = report.removed(), failed = report.failed(), "Sweep finished");
                }
            }
        }
        info!("Retention sweeper stopped");
    }

    /// Runs [`run_periodic`](Self::run_periodic) on a background task.
    pub fn spawn(self, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(async move {
            self.run_periodic(interval, shutdown_rx).await;
        });
        SweeperHandle { shutdown_tx, task }
    }
}

/// Handle to a background sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the sweeper to stop and waits for it.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Retention sweeper task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::TempDir;

    fn age(path: &Path, by: Duration) {
        let when = SystemTime::now() - by;
        filetime::set_file_mtime(path, FileTime::from_system_time(when)).unwrap();
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_old_files() {
        let temp = TempDir::new().unwrap();
        let old = temp.path().join("old.mp4");
        let fresh = temp.path().join("fresh.mp4");
        std::fs::write(&old, b"old").unwrap();
        std::fs::write(&fresh, b"fresh").unwrap();
        age(&old, Duration::from_secs(3 * 3600));

        let report = sweep(&[temp.path().to_path_buf()], Duration::from_secs(7200)).await;

        assert_eq!(report.removed(), 1);
        assert_eq!(report.failed(), 0);
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn test_sweep_leaves_subdirectories() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        let inner = nested.join("inner.png");
        std::fs::write(&inner, b"x").unwrap();
        age(&inner, Duration::from_secs(3 * 3600));
        age(&nested, Duration::from_secs(3 * 3600));

        let report = sweep(&[temp.path().to_path_buf()], Duration::from_secs(60)).await;

        assert_eq!(report.removed(), 0);
        assert!(inner.exists());
    }

    #[tokio::test]
    async fn test_missing_directory_does_not_stop_sweep() {
        let temp = TempDir::new().unwrap();
        let old = temp.path().join("old.txt");
        std::fs::write(&old, b"old").unwrap();
        age(&old, Duration::from_secs(600));

        let dirs = vec![temp.path().join("does-not-exist"), temp.path().to_path_buf()];
        let report = sweep(&dirs, Duration::from_secs(60)).await;

        assert_eq!(report.directories.len(), 2);
        assert_eq!(report.directories[0].removed, 0);
        assert_eq!(report.directories[1].removed, 1);
    }

    #[tokio::test]
    async fn test_spawned_sweeper_runs_and_stops() {
        let temp = TempDir::new().unwrap();
        let old = temp.path().join("stale.gif");
        std::fs::write(&old, b"stale").unwrap();
        age(&old, Duration::from_secs(600));

        let sweeper = RetentionSweeper::new(vec![temp.path().to_path_buf()], Duration::from_secs(60));
        let handle = sweeper.spawn(Duration::from_millis(20));

        for _ in 0..100 {
            if !old.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.shutdown().await;
        assert!(!old.exists());
    }
}
