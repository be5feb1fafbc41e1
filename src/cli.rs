// src/cli.rs
use std::path::PathBuf;

use clap::Parser;

use crate::config::consts::*;
use crate::config::options::timeout_from_secs;
use crate::config::{FetchOptions, RunOptions, Source, UpdateOptions};
use crate::error::{Error, Result};
use crate::log::{self, Level};
use crate::progress::Progress;
use crate::runner;

#[derive(Debug, Parser)]
#[command(name = "hnair_table", version)]
#[command(
    about = "Download the HNAir table and update an Excel workbook.",
    long_about = "Download the HNAir table and update an Excel workbook. If the workbook already \
                  exists, the 'Latest' sheet is replaced and a dated history sheet is added \
                  (unless disabled)."
)]
pub struct Args {
    /// Page containing the target table
    #[arg(long, env = ENV_TABLE_URL, default_value = DEFAULT_TABLE_URL, conflicts_with = "input")]
    pub url: String,

    /// Read the page from a saved HTML file instead of downloading it
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Excel workbook to update
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Zero-based index of the table to extract when several are present
    #[arg(long, default_value_t = DEFAULT_TABLE_INDEX, allow_hyphen_values = true)]
    pub table_index: i64,

    /// Name of the sheet that stores the most recent snapshot
    #[arg(long, default_value = DEFAULT_LATEST_SHEET)]
    pub latest_sheet_name: String,

    /// Explicit name for the history sheet (defaults to today's date, YYYY-MM-DD)
    #[arg(long)]
    pub history_sheet_name: Option<String>,

    /// Only update the latest sheet without keeping dated history sheets
    #[arg(long)]
    pub skip_history: bool,

    /// Timeout in seconds for the HTTP request
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, allow_hyphen_values = true)]
    pub timeout: f64,

    /// Append a run log to this file
    #[arg(long, env = ENV_LOG_FILE, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log debug detail (with --log-file)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print only the final summary
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn to_options(&self) -> Result<RunOptions> {
        let timeout = timeout_from_secs(self.timeout).map_err(Error::InvalidOption)?;
        let source = match &self.input {
            Some(path) => Source::File(path.clone()),
            None => Source::Url(self.url.clone()),
        };
        Ok(RunOptions {
            fetch: FetchOptions { source, table_index: self.table_index, timeout },
            update: UpdateOptions {
                output: self.output.clone(),
                latest_sheet_name: self.latest_sheet_name.clone(),
                include_history: !self.skip_history,
                history_sheet_name: self.history_sheet_name.clone(),
            },
        })
    }
}

/// Prints run steps to stderr.
pub struct ConsoleProgress {
    quiet: bool,
}

impl Progress for ConsoleProgress {
    fn log(&mut self, msg: &str) {
        if !self.quiet {
            eprintln!("{msg}");
        }
    }
}

pub fn run(args: Args) -> Result<()> {
    log::init(args.log_file.clone(), Level::from_verbosity(args.verbose));
    logd!("{args:?}");

    let opts = args.to_options()?;
    let mut progress = ConsoleProgress { quiet: args.quiet };
    let summary = runner::run(&opts, &mut progress)?;

    logf!("{}", summary.message());
    println!("{}", summary.message());
    Ok(())
}
