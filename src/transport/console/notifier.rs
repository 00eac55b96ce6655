//! Progress sink for the console bootstrap: a timestamped event log or nothing.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::app::logging::EventLogFormat;

/// Receives `(event, message)` progress reports from the bootstrap utility.
pub enum Notifier {
    Logging(EventLog),
    Silent,
}

impl Notifier {
    /// Append events to `path` under the logger `netconify.<host>`.
    pub fn logging(path: &Path, host: &str) -> Result<Self> {
        Ok(Self::Logging(EventLog::open(path, host)?))
    }

    pub fn notify(&self, event: &str, message: &str) {
        match self {
            Self::Logging(log) => log.write(event, message),
            Self::Silent => {}
        }
    }
}

pub struct EventLog {
    path: PathBuf,
    dispatch: tracing::Dispatch,
}

impl EventLog {
    fn open(path: &Path, host: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {:?}", path))?;

        let subscriber = tracing_subscriber::fmt()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .event_format(EventLogFormat {
                logger: format!("netconify.{}", host),
            })
            .finish();

        Ok(Self {
            path: path.to_path_buf(),
            dispatch: tracing::Dispatch::new(subscriber),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, event: &str, message: &str) {
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::info!("{}:{}", event, message);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_timestamped_event_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bootstrap.log");
        std::fs::write(&path, "previous run\n").unwrap();

        let notifier = Notifier::logging(&path, "r7").unwrap();
        notifier.notify("login", "connected to console");
        notifier.notify("facts", "done");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "previous run");
        assert!(lines[1].ends_with(":netconify.r7:login:connected to console"));
        assert!(lines[2].ends_with(":netconify.r7:facts:done"));
        // "YYYY-MM-DD HH:MM:SS,mmm" prefix
        assert_eq!(lines[1].find(":netconify"), Some(23));
    }

    #[test]
    fn silent_notifier_writes_nothing() {
        Notifier::Silent.notify("login", "ignored");
    }

    #[test]
    fn unwritable_log_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Notifier::logging(&dir.path().join("missing/x.log"), "r1").is_err());
    }
}
