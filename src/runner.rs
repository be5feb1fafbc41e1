// src/runner.rs
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::config::{FetchOptions, RunOptions, Source};
use crate::core::net::{decode_body, fetch_page};
use crate::core::{extract_table_rows, Row, TableScanner};
use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::workbook::{self, validate_sheet_name};

const ISO_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";

/// Rows of one table plus where and when they were read.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchResult {
    pub rows: Vec<Row>,
    pub fetched_at: DateTime<Local>,
    pub url: String,
}

/// Summary of what was produced.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub rows: usize,
    pub path: PathBuf,
    pub fetched_at: DateTime<Local>,
    pub source: String,
}

impl RunSummary {
    /// The line printed after a successful run.
    pub fn message(&self) -> String {
        format!(
            "Saved {} rows to '{}'. Fetched at {} from {}.",
            self.rows,
            self.path.display(),
            self.fetched_at.format(ISO_SECONDS),
            self.source
        )
    }
}

/// Download `url` and extract its `index`-th table.
/// A negative index fails before any request is made.
pub fn fetch_table_rows(url: &str, index: i64, timeout: Duration) -> Result<FetchResult> {
    TableScanner::new(index)?;
    let markup = fetch_page(url, timeout)?;
    let rows = extract_table_rows(&markup, index)?;
    Ok(FetchResult { rows, fetched_at: Local::now(), url: s!(url) })
}

/// Same as [`fetch_table_rows`] but honours a file source as well.
pub fn load_table_rows(opts: &FetchOptions) -> Result<FetchResult> {
    match &opts.source {
        Source::Url(url) => fetch_table_rows(url, opts.table_index, opts.timeout),
        Source::File(path) => {
            TableScanner::new(opts.table_index)?;
            let bytes = fs::read(path).map_err(|source| Error::Io { path: path.clone(), source })?;
            let markup = decode_body(&bytes, "utf-8");
            logf!("Read {} bytes of markup from {}", bytes.len(), path.display());
            let rows = extract_table_rows(&markup, opts.table_index)?;
            Ok(FetchResult { rows, fetched_at: Local::now(), url: opts.source.label() })
        }
    }
}

/// Fetch, scan and update the workbook.
pub fn run(opts: &RunOptions, progress: &mut dyn Progress) -> Result<RunSummary> {
    progress.begin(2);
    let outcome = run_steps(opts, progress);
    if let Err(e) = &outcome {
        loge!("Run failed: {e}");
    }
    progress.finish();
    outcome
}

fn run_steps(opts: &RunOptions, progress: &mut dyn Progress) -> Result<RunSummary> {
    // Bad sheet names should not cost a download.
    validate_sheet_name(&opts.update.latest_sheet_name)?;
    if opts.update.include_history {
        if let Some(name) = &opts.update.history_sheet_name {
            validate_sheet_name(name)?;
        }
    }

    progress.log(&format!("Fetching table {} from {}", opts.fetch.table_index, opts.fetch.source.label()));
    let fetched = load_table_rows(&opts.fetch)?;
    logf!("Captured {} rows from {}", fetched.rows.len(), fetched.url);
    progress.step_done("fetch");

    progress.log(&format!("Updating {}", opts.update.output.display()));
    let path = workbook::update_workbook(&fetched.rows, &opts.update, fetched.fetched_at, &fetched.url)?;
    progress.step_done("save");

    Ok(RunSummary {
        rows: fetched.rows.len(),
        path,
        fetched_at: fetched.fetched_at,
        source: fetched.url,
    })
}
