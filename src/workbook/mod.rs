// src/workbook/mod.rs
//! # Workbook module
//!
//! An in-memory workbook of string cells that can be loaded from and saved to
//! `.xlsx`, plus the update policy used after every download:
//!
//! - the *latest* sheet is rebuilt from scratch on every run;
//! - a dated *history* sheet (one per day unless named explicitly) is rebuilt
//!   alongside it, so earlier days stay untouched;
//! - any other sheet already in the file is carried over as-is (values, column
//!   widths, frozen header).
//!
//! Only cell values survive a load/save cycle; styling and formulas written by
//! other tools are not preserved.
//!
//! ```text
//! runner ─▶ update_workbook(rows, opts, fetched_at, source)
//!             ├─ Workbook::load_or_new   (xlsx::read)
//!             ├─ reset_sheet + write_rows (latest, history)
//!             └─ Workbook::save          (xlsx::write to temp, rename)
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use thiserror::Error;

use crate::config::UpdateOptions;
use crate::config::consts::*;
use crate::core::sanitize::split_lines;

pub mod reference;
mod xlsx;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("No rows provided for Excel export")]
    NoRows,

    #[error("Excel sheet names must be 31 characters or fewer: '{0}'")]
    SheetNameTooLong(String),

    #[error("Excel sheet names must not be empty")]
    EmptySheetName,

    #[error("sheet name '{name}' contains {ch:?}, which Excel does not allow")]
    InvalidSheetName { name: String, ch: char },

    #[error("table is too large for a worksheet ({rows} rows x {columns} columns)")]
    TooLarge { rows: usize, columns: usize },

    #[error("failed to {action} '{}': {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{}' is not a usable xlsx package: {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("malformed XML in {part}: {message}")]
    Xml { part: String, message: String },

    #[error("'{}': {message}", path.display())]
    Malformed { path: PathBuf, message: String },
}

impl WorkbookError {
    pub(crate) fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        WorkbookError::Io { action, path: path.to_path_buf(), source }
    }
}

/// One worksheet: a sparse grid of string cells keyed by zero-based (row, col).
#[derive(Clone, Debug, PartialEq)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<(u32, u32), String>,
    column_widths: BTreeMap<u32, f64>,
    freeze_header: bool,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            column_widths: BTreeMap::new(),
            freeze_header: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Empty values clear the cell.
    pub fn set_cell(&mut self, row: u32, col: u32, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&str> {
        self.cells.get(&(row, col)).map(String::as_str)
    }

    /// Non-empty cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = ((u32, u32), &str)> + '_ {
        self.cells.iter().map(|(&pos, v)| (pos, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Last used (row, col), zero-based.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let last_row = self.cells.keys().next_back()?.0;
        let last_col = self.cells.keys().map(|&(_, c)| c).max()?;
        Some((last_row, last_col))
    }

    /// Dense copy of the grid. Each row stops at its last non-empty cell.
    pub fn rows(&self) -> Vec<Vec<String>> {
        let Some((last_row, _)) = self.dimensions() else { return Vec::new() };
        let mut out = vec![Vec::new(); last_row as usize + 1];
        for (&(r, c), value) in &self.cells {
            let row = &mut out[r as usize];
            if row.len() <= c as usize {
                row.resize(c as usize + 1, s!());
            }
            row[c as usize] = value.clone();
        }
        out
    }

    pub fn set_column_width(&mut self, col: u32, width: f64) {
        self.column_widths.insert(col, width);
    }

    pub fn column_width(&self, col: u32) -> Option<f64> {
        self.column_widths.get(&col).copied()
    }

    pub fn column_widths(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.column_widths.iter().map(|(&c, &w)| (c, w))
    }

    pub fn freeze_header(&self) -> bool {
        self.freeze_header
    }

    pub fn set_freeze_header(&mut self, freeze: bool) {
        self.freeze_header = freeze;
    }
}

/// Core document properties (`docProps/core.xml`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Properties {
    pub creator: Option<String>,
    pub description: Option<String>,
    pub last_modified_by: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    pub properties: Properties,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    /// A fresh workbook holding one empty sheet named `Sheet`.
    pub fn new() -> Self {
        Self { sheets: vec![Sheet::new(DEFAULT_SHEET)], properties: Properties::default() }
    }

    pub(crate) fn from_parts(sheets: Vec<Sheet>, properties: Properties) -> Self {
        Self { sheets, properties }
    }

    pub fn open(path: &Path) -> Result<Self, WorkbookError> {
        xlsx::read(path)
    }

    pub fn load_or_new(path: &Path) -> Result<Self, WorkbookError> {
        if path.exists() {
            logd!("Loading existing workbook {}", path.display());
            Self::open(path)
        } else {
            logd!("Starting a new workbook for {}", path.display());
            Ok(Self::new())
        }
    }

    /// Write to a temporary file next to `path`, then move it into place.
    pub fn save(&self, path: &Path) -> Result<(), WorkbookError> {
        if self.sheets.is_empty() {
            return Err(WorkbookError::Malformed {
                path: path.to_path_buf(),
                message: s!("a workbook needs at least one sheet"),
            });
        }
        let tmp = temp_path(path);
        let result = xlsx::write(self, &tmp)
            .and_then(|()| fs::rename(&tmp, path).map_err(|e| WorkbookError::io("replace", path, e)));
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Sheet::name).collect()
    }

    /// Lookup is case-insensitive, like Excel's own sheet names.
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.position(name).map(|i| &self.sheets[i])
    }

    fn position(&self, name: &str) -> Option<usize> {
        let wanted = name.to_lowercase();
        self.sheets.iter().position(|s| s.name.to_lowercase() == wanted)
    }

    /// Only the untouched default sheet of a brand-new workbook.
    pub fn is_pristine(&self) -> bool {
        matches!(self.sheets.as_slice(), [only] if only.name == DEFAULT_SHEET && only.is_empty())
    }

    /// Give `name` a blank sheet.
    ///
    /// A pristine workbook has its default sheet renamed; otherwise an existing
    /// sheet of that name is dropped and a new one is appended at the end.
    pub fn reset_sheet(&mut self, name: &str) -> Result<&mut Sheet, WorkbookError> {
        validate_sheet_name(name)?;

        if self.is_pristine() {
            self.sheets[0].name = s!(name);
            return Ok(&mut self.sheets[0]);
        }

        if let Some(i) = self.position(name) {
            self.sheets.remove(i);
        }
        self.sheets.push(Sheet::new(name));
        let last = self.sheets.len() - 1;
        Ok(&mut self.sheets[last])
    }

    /// Drop an empty `Sheet` left over from a new workbook once real sheets exist.
    pub fn drop_empty_default_sheet(&mut self) -> bool {
        if self.sheets.len() < 2 {
            return false;
        }
        match self.sheets.iter().position(|s| s.name == DEFAULT_SHEET && s.is_empty()) {
            Some(i) => {
                self.sheets.remove(i);
                true
            }
            None => false,
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| s!("workbook.xlsx"));
    path.with_file_name(format!(".{name}.tmp"))
}

/// Excel's rules: 1..=31 characters, none of `[]:*?/\`, no control characters,
/// no leading or trailing apostrophe.
pub fn validate_sheet_name(name: &str) -> Result<(), WorkbookError> {
    if name.is_empty() {
        return Err(WorkbookError::EmptySheetName);
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(WorkbookError::SheetNameTooLong(s!(name)));
    }
    if let Some(ch) = name.chars().find(|c| INVALID_SHEET_CHARS.contains(c) || c.is_control()) {
        return Err(WorkbookError::InvalidSheetName { name: s!(name), ch });
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(WorkbookError::InvalidSheetName { name: s!(name), ch: '\'' });
    }
    Ok(())
}

/// Width for a column whose longest line has `chars` characters.
pub fn column_width(chars: usize) -> f64 {
    (chars + COLUMN_PADDING).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH) as f64
}

/// Write `rows` from A1, size the columns to their content and freeze row 1.
pub fn write_rows(sheet: &mut Sheet, rows: &[Vec<String>]) -> Result<(), WorkbookError> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if rows.len() > MAX_ROWS || columns > MAX_COLUMNS {
        return Err(WorkbookError::TooLarge { rows: rows.len(), columns });
    }

    let mut widths: BTreeMap<u32, usize> = BTreeMap::new();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            let col = c as u32;
            sheet.set_cell(r as u32, col, value.as_str());
            let longest = split_lines(value)
                .iter()
                .map(|line| line.chars().count())
                .max()
                .unwrap_or(0);
            let width = widths.entry(col).or_insert(0);
            *width = (*width).max(longest);
        }
    }

    for (col, chars) in widths {
        sheet.set_column_width(col, column_width(chars));
    }
    sheet.set_freeze_header(true);
    Ok(())
}

/// Refresh the workbook at `opts.output` with a new download.
///
/// Sheet names are validated before the file is touched. Returns the path
/// written.
pub fn update_workbook(
    rows: &[Vec<String>],
    opts: &UpdateOptions,
    fetched_at: DateTime<Local>,
    source: &str,
) -> Result<PathBuf, WorkbookError> {
    if rows.is_empty() {
        return Err(WorkbookError::NoRows);
    }
    validate_sheet_name(&opts.latest_sheet_name)?;
    let history = opts.history_name(&fetched_at);
    if let Some(name) = &history {
        validate_sheet_name(name)?;
    }

    let target = opts.output.clone();
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| WorkbookError::io("create directory", parent, e))?;
        }
    }

    let mut book = Workbook::load_or_new(&target)?;

    write_rows(book.reset_sheet(&opts.latest_sheet_name)?, rows)?;
    logf!("Wrote {} rows to sheet '{}'", rows.len(), opts.latest_sheet_name);

    if let Some(name) = history {
        write_rows(book.reset_sheet(&name)?, rows)?;
        logf!("Wrote {} rows to history sheet '{name}'", rows.len());
    }

    if book.drop_empty_default_sheet() {
        logd!("Removed empty default sheet");
    }

    let modified = fetched_at.with_timezone(&Utc);
    let props = &mut book.properties;
    props.created.get_or_insert(modified);
    props.modified = Some(modified);
    props.last_modified_by = Some(s!(LAST_MODIFIED_BY));
    props.description = Some(format!(
        "Data fetched from {source} on {}",
        fetched_at.format("%Y-%m-%dT%H:%M:%S")
    ));

    book.save(&target)?;
    logf!("Saved workbook {} ({} sheets)", target.display(), book.sheets().len());
    Ok(target)
}
