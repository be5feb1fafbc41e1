// tests/workbook_update.rs
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, TimeZone};

use hnair_table::config::UpdateOptions;
use hnair_table::workbook::{update_workbook, write_rows, Workbook, WorkbookError};

fn tmp_dir(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("hnair_table_wb_{}", name));
    let _ = fs::remove_dir_all(&p);
    fs::create_dir_all(&p).unwrap();
    p
}

fn at(day: u32, hour: u32) -> DateTime<Local> {
    NaiveDate::from_ymd_opt(2026, 10, day)
        .and_then(|d| d.and_hms_opt(hour, 30, 0))
        .and_then(|dt| Local.from_local_datetime(&dt).single())
        .unwrap()
}

fn rows(tag: &str) -> Vec<Vec<String>> {
    vec![
        vec!["Flight".into(), "Route".into()],
        vec![format!("HU{tag}"), "Haikou\nBeijing".into()],
    ]
}

fn opts(path: PathBuf) -> UpdateOptions {
    UpdateOptions { output: path, ..UpdateOptions::default() }
}

const URL: &str = "https://example.com/table";

#[test]
fn new_workbook_gets_latest_and_dated_history() {
    let dir = tmp_dir("new");
    let path = dir.join("nested").join("book.xlsx");

    let written = update_workbook(&rows("1"), &opts(path.clone()), at(19, 8), URL).unwrap();
    assert_eq!(written, path);

    let book = Workbook::open(&path).unwrap();
    assert_eq!(book.sheet_names(), vec!["Latest", "2026-10-19"]);

    let latest = book.sheet("Latest").unwrap();
    assert_eq!(latest.rows(), rows("1"));
    assert!(latest.freeze_header());
    assert_eq!(latest.column_width(0), Some(10.0));
    assert_eq!(latest.column_width(1), Some(10.0));
    assert_eq!(book.sheet("2026-10-19").unwrap().rows(), rows("1"));

    let props = &book.properties;
    assert_eq!(props.last_modified_by.as_deref(), Some("hanair-data automation"));
    assert_eq!(
        props.description.as_deref(),
        Some("Data fetched from https://example.com/table on 2026-10-19T08:30:00")
    );
    assert_eq!(props.modified, Some(at(19, 8).with_timezone(&chrono::Utc)));
}

#[test]
fn same_day_rerun_replaces_and_new_day_appends() {
    let dir = tmp_dir("rerun");
    let path = dir.join("book.xlsx");

    update_workbook(&rows("1"), &opts(path.clone()), at(18, 8), URL).unwrap();
    update_workbook(&rows("2"), &opts(path.clone()), at(19, 8), URL).unwrap();
    update_workbook(&rows("3"), &opts(path.clone()), at(19, 20), URL).unwrap();

    let book = Workbook::open(&path).unwrap();
    assert_eq!(book.sheet_names(), vec!["2026-10-18", "Latest", "2026-10-19"]);
    assert_eq!(book.sheet("Latest").unwrap().rows(), rows("3"));
    assert_eq!(book.sheet("2026-10-18").unwrap().rows(), rows("1"));
    assert_eq!(book.sheet("2026-10-19").unwrap().rows(), rows("3"));
    // created is kept from the first save
    assert_eq!(book.properties.created, Some(at(18, 8).with_timezone(&chrono::Utc)));
}

#[test]
fn skip_history_writes_only_latest() {
    let dir = tmp_dir("skip");
    let path = dir.join("book.xlsx");
    let mut o = opts(path.clone());
    o.include_history = false;

    update_workbook(&rows("1"), &o, at(19, 8), URL).unwrap();
    let book = Workbook::open(&path).unwrap();
    assert_eq!(book.sheet_names(), vec!["Latest"]);
}

#[test]
fn unrelated_sheets_survive_an_update() {
    let dir = tmp_dir("keep");
    let path = dir.join("book.xlsx");

    let mut book = Workbook::new();
    let notes = book.reset_sheet("Notes").unwrap();
    write_rows(notes, &[vec!["keep me".into()], vec!["A & B <c>".into()]]).unwrap();
    book.save(&path).unwrap();

    update_workbook(&rows("1"), &opts(path.clone()), at(19, 8), URL).unwrap();

    let book = Workbook::open(&path).unwrap();
    assert_eq!(book.sheet_names(), vec!["Notes", "Latest", "2026-10-19"]);
    let notes = book.sheet("Notes").unwrap();
    assert_eq!(notes.rows(), vec![vec!["keep me"], vec!["A & B <c>"]]);
    assert_eq!(notes.column_width(0), Some(11.0));
    assert!(notes.freeze_header());
}

#[test]
fn explicit_history_name_is_used() {
    let dir = tmp_dir("named");
    let path = dir.join("book.xlsx");
    let mut o = opts(path.clone());
    o.history_sheet_name = Some("Week 42".into());
    o.latest_sheet_name = "Now".into();

    update_workbook(&rows("1"), &o, at(19, 8), URL).unwrap();
    let book = Workbook::open(&path).unwrap();
    assert_eq!(book.sheet_names(), vec!["Now", "Week 42"]);
}

#[test]
fn invalid_input_leaves_the_file_untouched() {
    let dir = tmp_dir("invalid");
    let path = dir.join("book.xlsx");

    let err = update_workbook(&[], &opts(path.clone()), at(19, 8), URL).unwrap_err();
    assert!(matches!(err, WorkbookError::NoRows));

    let mut o = opts(path.clone());
    o.history_sheet_name = Some("x".repeat(32));
    let err = update_workbook(&rows("1"), &o, at(19, 8), URL).unwrap_err();
    assert!(matches!(err, WorkbookError::SheetNameTooLong(_)));

    assert!(!path.exists());
}

#[test]
fn garbage_file_is_reported_not_overwritten() {
    let dir = tmp_dir("garbage");
    let path = dir.join("book.xlsx");
    fs::write(&path, b"not a zip").unwrap();

    let err = update_workbook(&rows("1"), &opts(path.clone()), at(19, 8), URL).unwrap_err();
    assert!(matches!(err, WorkbookError::Zip { .. }));
    assert_eq!(fs::read(&path).unwrap(), b"not a zip");
}
