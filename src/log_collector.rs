//! Logging sink for wasi-prep.
//!
//! Every `log::*` record is written to stderr and, when a log file is
//! configured, appended to that file as well. stdout is never touched so the
//! `flags` subcommand output stays machine-readable.
//!
//! ```text
//! log::info!(...)
//!     |
//! [LogCollector]
//!     |
//! +---+---+
//! |       |
//! v       v
//! stderr  --log-file (append)
//! ```

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// A formatted log line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    /// The actual log message, level included
    pub message: String,
    /// Timestamp of when the log was created
    pub timestamp: String,
}

impl LogLine {
    pub fn new(message: String) -> Self {
        LogLine {
            message,
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }

    /// `[timestamp] message`, no trailing newline
    pub fn render(&self) -> String {
        format!("[{}] {}", self.timestamp, self.message)
    }
}

/// Map a `-v` count to a level: warn, info, debug, trace.
pub fn level_from_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Parse a level name as used by the log level environment variable.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Unified logger for stderr and an optional append-only file
pub struct LogCollector {
    level: LevelFilter,
    /// Open log file, if any
    file: Option<Mutex<File>>,
}

impl LogCollector {
    /// Create a collector; `log_file` is created (with parents) or appended to.
    pub fn new(level: LevelFilter, log_file: Option<&Path>) -> Result<Self, String> {
        let file = match log_file {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| format!("Failed to create log dir: {}", e))?;
                    }
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))?;
                Some(Mutex::new(file))
            }
            None => None,
        };

        Ok(LogCollector { level, file })
    }

    /// Write one line to every sink
    pub fn log_line(&self, line: &LogLine) {
        let formatted = format!("{}\n", line.render());

        let _ = std::io::stderr().write_all(formatted.as_bytes());

        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                if let Err(e) = f.write_all(formatted.as_bytes()) {
                    eprintln!("[LogCollector] Failed to write log file: {}", e);
                }
            }
        }
    }

    /// Install as the global `log` backend.
    pub fn install(self) -> Result<(), String> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))
            .map(|()| log::set_max_level(level))
            .map_err(|e| format!("Failed to set LogCollector as global logger: {}", e))
    }
}

impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!("[{}] {}", record.level(), record.args());
            self.log_line(&LogLine::new(message));
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use tempfile::tempdir;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_from_verbosity(0), LevelFilter::Warn);
        assert_eq!(level_from_verbosity(1), LevelFilter::Info);
        assert_eq!(level_from_verbosity(2), LevelFilter::Debug);
        assert_eq!(level_from_verbosity(9), LevelFilter::Trace);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Some(LevelFilter::Debug));
        assert_eq!(parse_level(" warning "), Some(LevelFilter::Warn));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_line_format() {
        let line = LogLine::new("[INFO] [Fetch] Downloading".to_string());
        let rendered = line.render();
        // [HH:MM:SS.mmm] prefix
        assert_eq!(&rendered[0..1], "[");
        assert_eq!(&rendered[13..15], "] ");
        assert!(rendered.ends_with("[INFO] [Fetch] Downloading"));
    }

    #[test]
    fn test_install_sets_global_level() {
        let collector = LogCollector::new(LevelFilter::Info, None).unwrap();
        collector.install().unwrap();
        assert_eq!(log::max_level(), LevelFilter::Info);
    }

    #[test]
    fn test_file_sink_appends_enabled_records() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("logs/wasi-prep.log");
        let collector = LogCollector::new(LevelFilter::Info, Some(&path)).unwrap();

        collector.log(
            &Record::builder()
                .level(Level::Info)
                .args(format_args!("[Patcher] Patched src/Makefile"))
                .build(),
        );
        collector.log(
            &Record::builder()
                .level(Level::Debug)
                .args(format_args!("hidden"))
                .build(),
        );
        collector.flush();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[INFO] [Patcher] Patched src/Makefile\n"));
        assert!(!content.contains("hidden"));
        assert_eq!(content.lines().count(), 1);
    }
}
