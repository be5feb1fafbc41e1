// src/config/consts.rs

// Net config
// Announcement page carrying the table; override with --url or HNAIR_TABLE_URL.
pub const DEFAULT_TABLE_URL: &str = "https://www.hnair.com/";
pub const ENV_TABLE_URL: &str = "HNAIR_TABLE_URL";
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;
pub const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

// Scrape
pub const DEFAULT_TABLE_INDEX: i64 = 0;

// Workbook
pub const DEFAULT_OUTPUT: &str = "hnair_table.xlsx";
pub const DEFAULT_LATEST_SHEET: &str = "Latest";
pub const DEFAULT_SHEET: &str = "Sheet"; // name of the sheet in a brand-new workbook
pub const HISTORY_DATE_FORMAT: &str = "%Y-%m-%d";
pub const MAX_SHEET_NAME_LEN: usize = 31;
pub const INVALID_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];
pub const MAX_ROWS: usize = 1_048_576;
pub const MAX_COLUMNS: usize = 16_384;
pub const COLUMN_PADDING: usize = 2;
pub const MIN_COLUMN_WIDTH: usize = 10;
pub const MAX_COLUMN_WIDTH: usize = 60;
pub const LAST_MODIFIED_BY: &str = "hanair-data automation";
pub const APPLICATION: &str = "hnair_table";

// Logging
pub const ENV_LOG_FILE: &str = "HNAIR_TABLE_LOG";
