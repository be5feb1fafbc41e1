// src/core/mod.rs
//! Page access and table extraction.
//!
//! - `net` downloads the page text.
//! - `tokens` splits markup into tags and text.
//! - `html` picks one table out of the token stream.
//! - `sanitize` holds the text clean-up shared by the above.

pub mod html;
pub mod net;
pub mod sanitize;
pub mod tokens;

pub use html::{extract_table_rows, Row, ScanError, TableScanner};
pub use tokens::{Token, Tokens};
