// src/log.rs
//! Tiny append-only file logger.
//!
//! Nothing is written until [`init`] has been called with a path. Lines look like
//! `[00:00:01.250][INFO] Captured 42 rows`, where the stamp is the time since start.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }

    /// `-v` count to level: 0 → Info, 1+ → Debug.
    pub fn from_verbosity(verbose: u8) -> Self {
        if verbose == 0 { Level::Info } else { Level::Debug }
    }
}

struct Sink {
    path: PathBuf,
    max: Level,
}

static SINK: OnceLock<Sink> = OnceLock::new();
static LOG_LOCK: Mutex<()> = Mutex::new(());
static START: OnceLock<Instant> = OnceLock::new();

fn start() -> Instant {
    *START.get_or_init(Instant::now)
}

fn fmt_elapsed(ms: u128) -> String {
    let total_ms = ms as u64;
    let h = total_ms / 3_600_000;
    let m = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1_000;
    let ms = total_ms % 1_000;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

/// Route log lines to `path` up to `max` level.
/// Returns false when no path was given or a sink was already installed.
pub fn init(path: Option<PathBuf>, max: Level) -> bool {
    start();
    let Some(path) = path else { return false };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = fs::create_dir_all(parent);
        }
    }
    SINK.set(Sink { path, max }).is_ok()
}

pub fn enabled(level: Level) -> bool {
    SINK.get().is_some_and(|sink| level <= sink.max)
}

/// Internal logging function
pub fn write_log(level: Level, msg: &str) {
    let Some(sink) = SINK.get() else { return };
    if level > sink.max {
        return;
    }
    let elapsed = fmt_elapsed(start().elapsed().as_millis());
    let line = format!("[{elapsed}][{}] {msg}\n", level.as_str());

    if let Ok(_guard) = LOG_LOCK.lock() {
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&sink.path)
        {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

/// Info-level logging
#[macro_export]
macro_rules! logf {
    ($($arg:tt)*) => {
        if $crate::log::enabled($crate::log::Level::Info) {
            $crate::log::write_log($crate::log::Level::Info, &format!($($arg)*))
        }
    };
}

/// Debug-level logging
#[macro_export]
macro_rules! logd {
    ($($arg:tt)*) => {
        if $crate::log::enabled($crate::log::Level::Debug) {
            $crate::log::write_log($crate::log::Level::Debug, &format!($($arg)*))
        }
    };
}

/// Warning-level logging
#[macro_export]
macro_rules! logw {
    ($($arg:tt)*) => {
        if $crate::log::enabled($crate::log::Level::Warn) {
            $crate::log::write_log($crate::log::Level::Warn, &format!($($arg)*))
        }
    };
}

/// Error-level logging
#[macro_export]
macro_rules! loge {
    ($($arg:tt)*) => {
        if $crate::log::enabled($crate::log::Level::Error) {
            $crate::log::write_log($crate::log::Level::Error, &format!($($arg)*))
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_zero_padded() {
        assert_eq!(fmt_elapsed(0), "00:00:00.000");
        assert_eq!(fmt_elapsed(3_723_045), "01:02:03.045");
    }

    #[test]
    fn levels_order_from_quiet_to_chatty() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Info < Level::Debug);
        assert_eq!(Level::from_verbosity(0), Level::Info);
        assert_eq!(Level::from_verbosity(3), Level::Debug);
    }
}
