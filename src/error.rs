// src/error.rs
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::ScanError;
use crate::core::net::FetchError;
use crate::workbook::WorkbookError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Workbook(#[from] WorkbookError),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Fetch(_) | Error::Io { .. } | Error::InvalidOption(_) => 2,
            Error::Scan(_) => 3,
            Error::Workbook(_) => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
