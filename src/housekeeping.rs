//! Log retention: periodic removal of rolled log files.

use crate::config::{LoggingConfig, PollConfig};
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Outcome of one retention pass
#[derive(Debug, Clone, Default)]
pub struct CleanupResult {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
}

/// Decides on which ticks housekeeping runs: every `every` ticks, with 0
/// meaning every tick.
#[derive(Debug, Clone)]
pub struct HousekeepingSchedule {
    every: u64,
    ticks_since_run: u64,
}

impl HousekeepingSchedule {
    pub fn every(every: u64) -> Self {
        Self {
            every,
            ticks_since_run: 0,
        }
    }

    /// K = max(1, check interval / poll interval)
    pub fn from_intervals(check_interval_seconds: u64, poll_interval_seconds: u64) -> Self {
        let every = check_interval_seconds
            .checked_div(poll_interval_seconds)
            .unwrap_or(0)
            .max(1);
        Self::every(every)
    }

    pub fn period(&self) -> u64 {
        self.every
    }

    /// Record a completed tick; true when housekeeping is due
    pub fn record_tick(&mut self) -> bool {
        self.ticks_since_run += 1;
        if self.every == 0 || self.ticks_since_run >= self.every {
            self.ticks_since_run = 0;
            true
        } else {
            false
        }
    }
}

/// Removes log files older than the retention period.
pub struct LogRetention {
    directory: PathBuf,
    file_prefix: String,
    retention: Duration,
}

impl LogRetention {
    pub fn new<P: Into<PathBuf>>(directory: P, file_prefix: String, retention: Duration) -> Self {
        Self {
            directory: directory.into(),
            file_prefix,
            retention,
        }
    }

    /// Retention for the configured log directory, if there is one and
    /// retention is enabled
    pub fn from_config(config: &LoggingConfig) -> Option<Self> {
        match &config.directory {
            Some(directory) if config.retention_days > 0 => Some(Self::new(
                directory.clone(),
                config.file_prefix.clone(),
                config.retention(),
            )),
            _ => None,
        }
    }

    /// Delete expired log files. Per-file failures are collected, not fatal.
    pub async fn run_cleanup(&self) -> Result<CleanupResult> {
        let cutoff = SystemTime::now()
            .checked_sub(self.retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        debug!(
            "Log retention cutoff {:?} in {}",
            cutoff,
            self.directory.display()
        );

        let mut result = CleanupResult::default();
        let mut entries = fs::read_dir(&self.directory).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !self.is_log_file(&path) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    result
                        .errors
                        .push(format!("Failed to stat {}: {}", path.display(), e));
                    continue;
                }
            };

            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    result.errors.push(format!(
                        "No modification time for {}: {}",
                        path.display(),
                        e
                    ));
                    continue;
                }
            };

            if modified >= cutoff {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Deleted expired log file {}", path.display());
                    result.files_deleted += 1;
                    result.bytes_freed += metadata.len();
                }
                Err(e) => {
                    let message = format!("Failed to delete {}: {}", path.display(), e);
                    error!("{}", message);
                    result.errors.push(message);
                }
            }
        }

        Ok(result)
    }

    fn is_log_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(&self.file_prefix))
            .unwrap_or(false)
    }
}

/// Log retention bound to its tick schedule, driven by the poll loop.
pub struct Housekeeping {
    schedule: HousekeepingSchedule,
    retention: LogRetention,
}

impl Housekeeping {
    pub fn new(schedule: HousekeepingSchedule, retention: LogRetention) -> Self {
        Self {
            schedule,
            retention,
        }
    }

    pub fn from_config(logging: &LoggingConfig, poll: &PollConfig) -> Option<Self> {
        let retention = LogRetention::from_config(logging)?;
        let schedule = HousekeepingSchedule::from_intervals(
            logging.retention_check_interval_seconds,
            poll.interval_seconds,
        );
        info!(
            "Log retention enabled: {} day(s), checked every {} tick(s)",
            logging.retention_days,
            schedule.period()
        );
        Some(Self::new(schedule, retention))
    }

    /// Count a tick and run the cleanup when it is due
    pub async fn on_tick(&mut self) -> Option<CleanupResult> {
        if !self.schedule.record_tick() {
            return None;
        }

        match self.retention.run_cleanup().await {
            Ok(result) => {
                info!(
                    "Log retention completed: {} file(s) deleted, {} bytes freed",
                    result.files_deleted, result.bytes_freed
                );
                if !result.errors.is_empty() {
                    warn!(
                        "Log retention completed with {} errors: {:?}",
                        result.errors.len(),
                        result.errors
                    );
                }
                Some(result)
            }
            Err(e) => {
                error!("Log retention failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, age: Duration) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"2026-10-18 log line\n").unwrap();
        let file = File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
        path
    }

    const DAY: Duration = Duration::from_secs(24 * 3600);

    #[test]
    fn test_schedule_period_from_intervals() {
        assert_eq!(HousekeepingSchedule::from_intervals(3600, 60).period(), 60);
        assert_eq!(HousekeepingSchedule::from_intervals(30, 60).period(), 1);
        assert_eq!(HousekeepingSchedule::from_intervals(0, 60).period(), 1);
        assert_eq!(HousekeepingSchedule::from_intervals(3600, 0).period(), 1);
    }

    #[test]
    fn test_schedule_runs_every_k_ticks() {
        let mut schedule = HousekeepingSchedule::every(3);
        let due: Vec<bool> = (0..7).map(|_| schedule.record_tick()).collect();

        assert_eq!(due, vec![false, false, true, false, false, true, false]);
    }

    #[test]
    fn test_schedule_zero_runs_every_tick() {
        let mut schedule = HousekeepingSchedule::every(0);
        assert!((0..4).all(|_| schedule.record_tick()));
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_log_files() {
        let dir = TempDir::new().unwrap();
        let old_log = write_file(dir.path(), "autoshutdown.log.2026-10-01", 10 * DAY);
        let recent_log = write_file(dir.path(), "autoshutdown.log.2026-10-17", DAY);
        let unrelated = write_file(dir.path(), "notes.txt", 30 * DAY);

        let retention = LogRetention::new(dir.path(), "autoshutdown.log".to_string(), 7 * DAY);
        let result = retention.run_cleanup().await.unwrap();

        assert_eq!(result.files_deleted, 1);
        assert!(result.bytes_freed > 0);
        assert!(result.errors.is_empty());
        assert!(!old_log.exists());
        assert!(recent_log.exists());
        assert!(unrelated.exists());
    }

    #[tokio::test]
    async fn test_cleanup_missing_directory_is_error() {
        let retention = LogRetention::new(
            "/nonexistent/autoshutdown-logs",
            "autoshutdown.log".to_string(),
            DAY,
        );

        assert!(retention.run_cleanup().await.is_err());
    }

    #[tokio::test]
    async fn test_housekeeping_runs_on_schedule() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "autoshutdown.log.2026-09-01", 40 * DAY);
        write_file(dir.path(), "autoshutdown.log.2026-09-02", 39 * DAY);

        let mut housekeeping = Housekeeping::new(
            HousekeepingSchedule::every(2),
            LogRetention::new(dir.path(), "autoshutdown.log".to_string(), 7 * DAY),
        );

        assert!(housekeeping.on_tick().await.is_none());
        let result = housekeeping.on_tick().await.unwrap();
        assert_eq!(result.files_deleted, 2);
    }

    #[test]
    fn test_retention_disabled_without_directory_or_days() {
        let mut logging = crate::config::AutoshutdownConfig::default().logging;
        assert!(LogRetention::from_config(&logging).is_none());

        logging.directory = Some(PathBuf::from("/var/log/autoshutdown"));
        assert!(LogRetention::from_config(&logging).is_some());

        logging.retention_days = 0;
        assert!(LogRetention::from_config(&logging).is_none());
    }
}
