// src/config/options.rs
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeZone};

use super::consts::*;

/// Where the markup comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Url(String),
    /// Saved page on disk, read as UTF-8.
    File(PathBuf),
}

impl Source {
    /// Label recorded in the workbook description and the summary line.
    pub fn label(&self) -> String {
        match self {
            Source::Url(url) => url.clone(),
            Source::File(path) => path.display().to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchOptions {
    pub source: Source,
    /// Zero-based; negative values are rejected by the scanner.
    pub table_index: i64,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            source: Source::Url(s!(DEFAULT_TABLE_URL)),
            table_index: DEFAULT_TABLE_INDEX,
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateOptions {
    pub output: PathBuf,
    pub latest_sheet_name: String,
    pub include_history: bool,
    /// Explicit history sheet name; the fetch date when `None`.
    pub history_sheet_name: Option<String>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            latest_sheet_name: s!(DEFAULT_LATEST_SHEET),
            include_history: true,
            history_sheet_name: None,
        }
    }
}

impl UpdateOptions {
    /// Name of the history sheet for a fetch made at `fetched_at`, if history is on.
    pub fn history_name<Tz: TimeZone>(&self, fetched_at: &DateTime<Tz>) -> Option<String>
    where
        Tz::Offset: std::fmt::Display,
    {
        if !self.include_history {
            return None;
        }
        Some(match &self.history_sheet_name {
            Some(name) => name.clone(),
            None => fetched_at.format(HISTORY_DATE_FORMAT).to_string(),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunOptions {
    pub fetch: FetchOptions,
    pub update: UpdateOptions,
}

/// Seconds from the command line to a request timeout. Must be finite and > 0.
pub fn timeout_from_secs(secs: f64) -> Result<Duration, String> {
    if secs.is_nan() || secs <= 0.0 {
        return Err(format!("timeout must be a positive number of seconds (got {secs})"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid timeout {secs}: {e}"))
}
