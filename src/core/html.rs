// src/core/html.rs
//! Table extraction from raw markup.
//!
//! [`TableScanner`] is a small state machine driven by [`Tokens`]. It counts
//! every `<table>` it sees, captures the one at the requested zero-based index
//! and turns its `<tr>`/`<td>`/`<th>` structure into rows of normalized strings.
//!
//! Nested tables inside the captured one are not modelled separately: their
//! rows and cells feed the same accumulators as the outer table. Nested tables
//! still count towards the table index.

use thiserror::Error;

use super::sanitize::normalize_cell;
use super::tokens::{Token, Tokens};

pub type Row = Vec<String>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("table index must be >= 0 (got {0})")]
    InvalidTableIndex(i64),

    #[error(
        "No table rows were found for table index {index} ({tables_seen} table(s) on the page). \
         Check that the page structure has not changed."
    )]
    TableNotFound { index: usize, tables_seen: usize },
}

#[derive(Debug)]
pub struct TableScanner {
    target: usize,
    tables_seen: usize,
    capture: bool,
    depth: usize,
    in_row: bool,
    in_cell: bool,
    rows: Vec<Row>,
    row: Row,
    cell: String,
}

impl TableScanner {
    /// Fails before any scanning when `index` is negative.
    pub fn new(index: i64) -> Result<Self, ScanError> {
        let target = usize::try_from(index).map_err(|_| ScanError::InvalidTableIndex(index))?;
        Ok(Self {
            target,
            tables_seen: 0,
            capture: false,
            depth: 0,
            in_row: false,
            in_cell: false,
            rows: Vec::new(),
            row: Vec::new(),
            cell: String::new(),
        })
    }

    pub fn feed(&mut self, token: Token<'_>) {
        match token {
            Token::StartTag { name, self_closing: false } => self.start_tag(&name),
            Token::StartTag { name, self_closing: true } => {
                if name == "br" && self.capture && self.in_cell {
                    self.cell.push('\n');
                }
            }
            Token::EndTag { name } => self.end_tag(&name),
            Token::Text(data) => {
                if self.capture && self.in_cell {
                    self.cell.push_str(&data);
                }
            }
        }
    }

    /// Rows captured so far, or `TableNotFound` when there are none.
    pub fn finish(self) -> Result<Vec<Row>, ScanError> {
        if self.rows.is_empty() {
            return Err(ScanError::TableNotFound {
                index: self.target,
                tables_seen: self.tables_seen,
            });
        }
        Ok(self.rows)
    }

    pub fn tables_seen(&self) -> usize {
        self.tables_seen
    }

    fn start_tag(&mut self, name: &str) {
        if name == "table" {
            let index = self.tables_seen;
            self.tables_seen += 1;
            if index == self.target {
                self.capture = true;
                self.depth = 1;
                return;
            }
            if self.capture {
                self.depth += 1;
                return;
            }
        }

        if !self.capture {
            return;
        }

        match name {
            "tr" => {
                self.in_row = true;
                self.row = Vec::new();
            }
            "td" | "th" => {
                self.in_cell = true;
                self.cell.clear();
            }
            "br" if self.in_cell => self.cell.push('\n'),
            _ => {}
        }
    }

    fn end_tag(&mut self, name: &str) {
        if name == "table" && self.capture {
            self.depth -= 1;
            if self.depth == 0 {
                self.capture = false;
            }
            return;
        }

        if !self.capture {
            return;
        }

        match name {
            "td" | "th" if self.in_cell => {
                self.row.push(normalize_cell(&self.cell));
                self.in_cell = false;
                self.cell.clear();
            }
            "tr" if self.in_row => {
                if !self.row.is_empty() {
                    self.rows.push(std::mem::take(&mut self.row));
                }
                self.in_row = false;
            }
            _ => {}
        }
    }
}

/// Rows of the `index`-th table (zero-based, document order) in `markup`.
pub fn extract_table_rows(markup: &str, index: i64) -> Result<Vec<Row>, ScanError> {
    let mut scanner = TableScanner::new(index)?;
    for token in Tokens::new(markup) {
        scanner.feed(token);
    }
    let tables = scanner.tables_seen();
    let rows = scanner.finish()?;
    logd!("Scanned table {index}: {} rows ({tables} tables on page)", rows.len());
    Ok(rows)
}
