// src/workbook/xlsx.rs
//! `.xlsx` package reading and writing.
//!
//! Reading keeps what the [`Workbook`] model can hold: sheet order and names,
//! cell values as text (shared strings, inline strings, numbers, booleans),
//! column widths, a frozen header row and the core document properties.
//! Writing produces a minimal package with every cell stored as an inline string.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Reader;
use quick_xml::escape::{escape, resolve_xml_entity};
use quick_xml::events::{BytesRef, BytesStart, Event};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::reference::{cell_reference, parse_cell_reference};
use super::{Properties, Sheet, Workbook, WorkbookError};
use crate::config::consts::{APPLICATION, MAX_COLUMNS};

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";
const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_DOC_RELS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_WORKSHEET: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

const PART_WORKBOOK: &str = "xl/workbook.xml";
const PART_WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const PART_SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const PART_CORE: &str = "docProps/core.xml";

/* ---------------- Reading ---------------- */

pub(crate) fn read(path: &Path) -> Result<Workbook, WorkbookError> {
    let file = File::open(path).map_err(|e| WorkbookError::io("open", path, e))?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|source| WorkbookError::Zip {
        path: path.to_path_buf(),
        source,
    })?;

    let workbook_xml = read_part(&mut zip, path, PART_WORKBOOK)?.ok_or_else(|| WorkbookError::Malformed {
        path: path.to_path_buf(),
        message: format!("missing {PART_WORKBOOK}"),
    })?;
    let entries = parse_workbook(&workbook_xml)?;

    let targets = match read_part(&mut zip, path, PART_WORKBOOK_RELS)? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };
    let shared = match read_part(&mut zip, path, PART_SHARED_STRINGS)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let mut sheets = Vec::with_capacity(entries.len());
    for (i, (name, rel_id)) in entries.into_iter().enumerate() {
        let part = targets
            .get(&rel_id)
            .map(|target| resolve_target(target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", i + 1));
        let xml = read_part(&mut zip, path, &part)?.ok_or_else(|| WorkbookError::Malformed {
            path: path.to_path_buf(),
            message: format!("missing {part} for sheet '{name}'"),
        })?;
        sheets.push(parse_sheet(name, &xml, &shared, &part)?);
    }
    if sheets.is_empty() {
        return Err(WorkbookError::Malformed {
            path: path.to_path_buf(),
            message: s!("workbook has no sheets"),
        });
    }

    let properties = match read_part(&mut zip, path, PART_CORE)? {
        Some(xml) => parse_core_properties(&xml)?,
        None => Properties::default(),
    };

    logd!("Read {} sheets from {}", sheets.len(), path.display());
    Ok(Workbook::from_parts(sheets, properties))
}

/// Part names are matched case-insensitively; `None` when the part is absent.
fn read_part<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    path: &Path,
    name: &str,
) -> Result<Option<String>, WorkbookError> {
    let wanted = name.replace('\\', "/");
    let actual = zip
        .file_names()
        .find(|candidate| candidate.eq_ignore_ascii_case(&wanted))
        .map(str::to_owned);
    let Some(actual) = actual else { return Ok(None) };

    let mut file = zip.by_name(&actual).map_err(|source| WorkbookError::Zip {
        path: path.to_path_buf(),
        source,
    })?;
    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|e| WorkbookError::io("read", path, e))?;
    Ok(Some(text))
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => s!(absolute),
        None => format!("xl/{target}"),
    }
}

fn xml_error(part: &str, err: impl std::fmt::Display) -> WorkbookError {
    WorkbookError::Xml { part: s!(part), message: err.to_string() }
}

fn new_reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.trim_text(false);
    config.expand_empty_elements = true;
    config.check_end_names = false;
    reader
}

/// Value of the attribute whose local name is `local` (prefixes ignored).
fn attribute(e: &BytesStart<'_>, local: &[u8], part: &str) -> Result<Option<String>, WorkbookError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error(part, err))?;
        if attr.key.local_name().as_ref() == local {
            let value = attr.unescape_value().map_err(|err| xml_error(part, err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn push_reference(out: &mut String, reference: &BytesRef<'_>, part: &str) -> Result<(), WorkbookError> {
    let raw = reference.xml_content().map_err(|err| xml_error(part, err))?;
    if let Some(number) = raw.strip_prefix('#') {
        let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => number.parse::<u32>().ok(),
        };
        let ch = code
            .and_then(char::from_u32)
            .ok_or_else(|| xml_error(part, format!("bad character reference &{raw};")))?;
        out.push(ch);
    } else if let Some(entity) = resolve_xml_entity(&raw) {
        out.push_str(entity);
    } else {
        return Err(xml_error(part, format!("unknown entity &{raw};")));
    }
    Ok(())
}

/// Collect the text content up to the end tag named `local`.
fn read_text(reader: &mut Reader<&[u8]>, local: &[u8], part: &str) -> Result<String, WorkbookError> {
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(|err| xml_error(part, err))? {
            Event::Text(t) => text.push_str(&t.xml_content().map_err(|err| xml_error(part, err))?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::GeneralRef(r) => push_reference(&mut text, &r, part)?,
            Event::End(e) if e.local_name().as_ref() == local => break,
            Event::Eof => return Err(xml_error(part, "unexpected end of document")),
            _ => {}
        }
    }
    Ok(text)
}

fn skip_element(reader: &mut Reader<&[u8]>, e: &BytesStart<'_>, part: &str) -> Result<(), WorkbookError> {
    reader.read_to_end(e.name()).map_err(|err| xml_error(part, err))?;
    Ok(())
}

/// (sheet name, relationship id) in workbook order.
fn parse_workbook(xml: &str) -> Result<Vec<(String, String)>, WorkbookError> {
    let mut reader = new_reader(xml);
    let mut out = Vec::new();
    loop {
        match reader.read_event().map_err(|err| xml_error(PART_WORKBOOK, err))? {
            Event::Start(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attribute(&e, b"name", PART_WORKBOOK)?
                    .ok_or_else(|| xml_error(PART_WORKBOOK, "<sheet> without a name"))?;
                let rel_id = attribute(&e, b"id", PART_WORKBOOK)?.unwrap_or_default();
                out.push((name, rel_id));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, WorkbookError> {
    let mut reader = new_reader(xml);
    let mut out = HashMap::new();
    loop {
        match reader.read_event().map_err(|err| xml_error(PART_WORKBOOK_RELS, err))? {
            Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = attribute(&e, b"Id", PART_WORKBOOK_RELS)?;
                let target = attribute(&e, b"Target", PART_WORKBOOK_RELS)?;
                if let (Some(id), Some(target)) = (id, target) {
                    out.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, WorkbookError> {
    let mut reader = new_reader(xml);
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event().map_err(|err| xml_error(PART_SHARED_STRINGS, err))? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => {
                    let text = read_text(&mut reader, b"t", PART_SHARED_STRINGS)?;
                    if let Some(cur) = current.as_mut() {
                        cur.push_str(&text);
                    }
                }
                // Phonetic runs repeat the text in another script.
                b"rPh" => skip_element(&mut reader, &e, PART_SHARED_STRINGS)?,
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"si" => {
                strings.push(current.take().unwrap_or_default());
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

struct PendingCell {
    row: u32,
    col: u32,
    kind: String,
    value: String,
}

fn cell_text(cell: PendingCell, shared: &[String], part: &str) -> String {
    match cell.kind.as_str() {
        "s" => match cell.value.trim().parse::<usize>().ok().and_then(|i| shared.get(i)) {
            Some(text) => text.clone(),
            None => {
                logw!("{part}: shared string '{}' out of range at {}", cell.value, cell_reference(cell.row, cell.col));
                s!()
            }
        },
        "b" => match cell.value.trim() {
            "1" => s!("TRUE"),
            "0" => s!("FALSE"),
            other => s!(other),
        },
        _ => cell.value,
    }
}

fn parse_sheet(name: String, xml: &str, shared: &[String], part: &str) -> Result<Sheet, WorkbookError> {
    let mut sheet = Sheet::new(name);
    let mut reader = new_reader(xml);
    let mut current_row = 0u32;
    let mut next_row = 0u32;
    let mut next_col = 0u32;
    let mut cell: Option<PendingCell> = None;

    loop {
        match reader.read_event().map_err(|err| xml_error(part, err))? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    current_row = attribute(&e, b"r", part)?
                        .and_then(|r| r.trim().parse::<u32>().ok())
                        .filter(|&r| r > 0)
                        .map_or(next_row, |r| r - 1);
                    next_row = current_row + 1;
                    next_col = 0;
                }
                b"c" => {
                    let (row, col) = attribute(&e, b"r", part)?
                        .and_then(|r| parse_cell_reference(&r))
                        .unwrap_or((current_row, next_col));
                    next_col = col + 1;
                    let kind = attribute(&e, b"t", part)?.unwrap_or_default();
                    cell = Some(PendingCell { row, col, kind, value: String::new() });
                }
                b"v" => {
                    let text = read_text(&mut reader, b"v", part)?;
                    if let Some(c) = cell.as_mut() {
                        c.value = text;
                    }
                }
                b"t" => {
                    let text = read_text(&mut reader, b"t", part)?;
                    if let Some(c) = cell.as_mut() {
                        c.value.push_str(&text);
                    }
                }
                b"rPh" => skip_element(&mut reader, &e, part)?,
                b"col" => read_column_width(&mut sheet, &e, part)?,
                b"pane" => {
                    let frozen = attribute(&e, b"state", part)?.is_some_and(|s| s == "frozen");
                    let y_split = attribute(&e, b"ySplit", part)?.and_then(|v| v.parse::<f64>().ok());
                    if frozen && y_split == Some(1.0) {
                        sheet.set_freeze_header(true);
                    }
                }
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"c" => {
                if let Some(c) = cell.take() {
                    let (row, col) = (c.row, c.col);
                    let text = cell_text(c, shared, part);
                    sheet.set_cell(row, col, text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheet)
}

fn read_column_width(sheet: &mut Sheet, e: &BytesStart<'_>, part: &str) -> Result<(), WorkbookError> {
    let min = attribute(e, b"min", part)?.and_then(|v| v.parse::<u32>().ok());
    let max = attribute(e, b"max", part)?.and_then(|v| v.parse::<u32>().ok());
    let width = attribute(e, b"width", part)?.and_then(|v| v.parse::<f64>().ok());
    if let (Some(min), Some(max), Some(width)) = (min, max, width) {
        let max = max.min(MAX_COLUMNS as u32);
        for col in min.max(1)..=max {
            sheet.set_column_width(col - 1, width);
        }
    }
    Ok(())
}

fn parse_core_properties(xml: &str) -> Result<Properties, WorkbookError> {
    let mut reader = new_reader(xml);
    let mut props = Properties::default();
    let stamp = |text: &str| {
        DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    };
    loop {
        match reader.read_event().map_err(|err| xml_error(PART_CORE, err))? {
            Event::Start(e) => {
                let local = e.local_name();
                let key = local.as_ref();
                if !matches!(key, b"creator" | b"description" | b"lastModifiedBy" | b"created" | b"modified") {
                    continue;
                }
                let text = read_text(&mut reader, key, PART_CORE)?;
                match key {
                    b"creator" => props.creator = Some(text),
                    b"description" => props.description = Some(text),
                    b"lastModifiedBy" => props.last_modified_by = Some(text),
                    b"created" => props.created = stamp(&text),
                    _ => props.modified = stamp(&text),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(props)
}

/* ---------------- Writing ---------------- */

pub(crate) fn write(book: &Workbook, path: &Path) -> Result<(), WorkbookError> {
    let zip_error = |source| WorkbookError::Zip { path: path.to_path_buf(), source };

    let file = File::create(path).map_err(|e| WorkbookError::io("create", path, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut parts: Vec<(String, String)> = vec![
        (s!("[Content_Types].xml"), content_types_xml(book)),
        (s!("_rels/.rels"), root_rels_xml()),
        (s!("docProps/app.xml"), app_xml()),
        (s!(PART_CORE), core_xml(&book.properties)),
        (s!(PART_WORKBOOK), workbook_xml(book)),
        (s!(PART_WORKBOOK_RELS), workbook_rels_xml(book)),
        (s!("xl/styles.xml"), s!(STYLES_XML)),
    ];
    for (i, sheet) in book.sheets().iter().enumerate() {
        parts.push((format!("xl/worksheets/sheet{}.xml", i + 1), sheet_xml(sheet, i == 0)));
    }

    for (name, body) in parts {
        zip.start_file(name.as_str(), options).map_err(zip_error)?;
        zip.write_all(body.as_bytes())
            .map_err(|e| WorkbookError::io("write", path, e))?;
    }
    let mut out = zip.finish().map_err(zip_error)?;
    out.flush().map_err(|e| WorkbookError::io("write", path, e))?;
    Ok(())
}

/// XML 1.0 cannot carry most control characters, even escaped.
fn is_xml_char(ch: char) -> bool {
    !matches!(ch, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
}

fn xml_text(s: &str) -> String {
    let cleaned: Cow<'_, str> = if s.chars().all(is_xml_char) {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.chars().filter(|&c| is_xml_char(c)).collect())
    };
    escape(cleaned.as_ref()).into_owned()
}

fn w3c_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn content_types_xml(book: &Workbook) -> String {
    let mut xml = s!(XML_DECL);
    xml.push_str(
        "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
         <Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>\
         <Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>\
         <Override PartName=\"/docProps/app.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.extended-properties+xml\"/>",
    );
    for i in 1..=book.sheets().len() {
        xml.push_str(&format!(
            "<Override PartName=\"/xl/worksheets/sheet{i}.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>"
        ));
    }
    xml.push_str("</Types>");
    xml
}

fn root_rels_xml() -> String {
    let mut xml = s!(XML_DECL);
    xml.push_str(&format!(
        "<Relationships xmlns=\"{NS_PKG_RELS}\">\
         <Relationship Id=\"rId1\" Type=\"{NS_DOC_RELS}/officeDocument\" Target=\"xl/workbook.xml\"/>\
         <Relationship Id=\"rId2\" Type=\"{NS_PKG_RELS}/metadata/core-properties\" Target=\"docProps/core.xml\"/>\
         <Relationship Id=\"rId3\" Type=\"{NS_DOC_RELS}/extended-properties\" Target=\"docProps/app.xml\"/>\
         </Relationships>"
    ));
    xml
}

fn app_xml() -> String {
    let mut xml = s!(XML_DECL);
    xml.push_str(&format!(
        "<Properties xmlns=\"http://schemas.openxmlformats.org/officeDocument/2006/extended-properties\">\
         <Application>{APPLICATION}</Application></Properties>"
    ));
    xml
}

fn core_xml(props: &Properties) -> String {
    let mut xml = s!(XML_DECL);
    xml.push_str(
        "<cp:coreProperties \
         xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
         xmlns:dc=\"http://purl.org/dc/elements/1.1/\" \
         xmlns:dcterms=\"http://purl.org/dc/terms/\" \
         xmlns:dcmitype=\"http://purl.org/dc/dcmitype/\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">",
    );
    if let Some(creator) = &props.creator {
        xml.push_str(&format!("<dc:creator>{}</dc:creator>", xml_text(creator)));
    }
    if let Some(description) = &props.description {
        xml.push_str(&format!("<dc:description>{}</dc:description>", xml_text(description)));
    }
    if let Some(by) = &props.last_modified_by {
        xml.push_str(&format!("<cp:lastModifiedBy>{}</cp:lastModifiedBy>", xml_text(by)));
    }
    if let Some(created) = &props.created {
        xml.push_str(&format!(
            "<dcterms:created xsi:type=\"dcterms:W3CDTF\">{}</dcterms:created>",
            w3c_datetime(created)
        ));
    }
    if let Some(modified) = &props.modified {
        xml.push_str(&format!(
            "<dcterms:modified xsi:type=\"dcterms:W3CDTF\">{}</dcterms:modified>",
            w3c_datetime(modified)
        ));
    }
    xml.push_str("</cp:coreProperties>");
    xml
}

fn workbook_xml(book: &Workbook) -> String {
    let mut xml = s!(XML_DECL);
    xml.push_str(&format!(
        "<workbook xmlns=\"{NS_MAIN}\" xmlns:r=\"{NS_DOC_RELS}\">\
         <bookViews><workbookView activeTab=\"0\"/></bookViews><sheets>"
    ));
    for (i, sheet) in book.sheets().iter().enumerate() {
        xml.push_str(&format!(
            "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>",
            xml_text(sheet.name()),
            i + 1,
            i + 1
        ));
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels_xml(book: &Workbook) -> String {
    let count = book.sheets().len();
    let mut xml = s!(XML_DECL);
    xml.push_str(&format!("<Relationships xmlns=\"{NS_PKG_RELS}\">"));
    for i in 1..=count {
        xml.push_str(&format!(
            "<Relationship Id=\"rId{i}\" Type=\"{REL_WORKSHEET}\" Target=\"worksheets/sheet{i}.xml\"/>"
        ));
    }
    xml.push_str(&format!(
        "<Relationship Id=\"rId{}\" Type=\"{REL_STYLES}\" Target=\"styles.xml\"/></Relationships>",
        count + 1
    ));
    xml
}

// Style 1 wraps text so multi-line cells show their line breaks.
const STYLES_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
<fonts count=\"1\"><font><sz val=\"11\"/><name val=\"Calibri\"/><family val=\"2\"/></font></fonts>\
<fills count=\"2\"><fill><patternFill patternType=\"none\"/></fill><fill><patternFill patternType=\"gray125\"/></fill></fills>\
<borders count=\"1\"><border><left/><right/><top/><bottom/><diagonal/></border></borders>\
<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>\
<cellXfs count=\"2\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/>\
<xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\" applyAlignment=\"1\">\
<alignment vertical=\"top\" wrapText=\"1\"/></xf></cellXfs>\
<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>\
</styleSheet>";

/// Runs of adjacent columns sharing a width, as (first, last, width).
fn width_spans(sheet: &Sheet) -> Vec<(u32, u32, f64)> {
    let mut spans: Vec<(u32, u32, f64)> = Vec::new();
    for (col, width) in sheet.column_widths() {
        match spans.last_mut() {
            Some((_, last, w)) if *last + 1 == col && *w == width => *last = col,
            _ => spans.push((col, col, width)),
        }
    }
    spans
}

fn sheet_xml(sheet: &Sheet, selected: bool) -> String {
    let mut xml = s!(XML_DECL);
    xml.push_str(&format!("<worksheet xmlns=\"{NS_MAIN}\" xmlns:r=\"{NS_DOC_RELS}\">"));

    let dimension = match sheet.dimensions() {
        Some((row, col)) => format!("A1:{}", cell_reference(row, col)),
        None => s!("A1"),
    };
    xml.push_str(&format!("<dimension ref=\"{dimension}\"/>"));

    xml.push_str("<sheetViews><sheetView workbookViewId=\"0\"");
    if selected {
        xml.push_str(" tabSelected=\"1\"");
    }
    if sheet.freeze_header() {
        xml.push_str(
            "><pane ySplit=\"1\" topLeftCell=\"A2\" activePane=\"bottomLeft\" state=\"frozen\"/>\
             <selection pane=\"bottomLeft\" activeCell=\"A2\" sqref=\"A2\"/></sheetView>",
        );
    } else {
        xml.push_str("/>");
    }
    xml.push_str("</sheetViews><sheetFormatPr defaultRowHeight=\"15\"/>");

    let spans = width_spans(sheet);
    if !spans.is_empty() {
        xml.push_str("<cols>");
        for (first, last, width) in spans {
            xml.push_str(&format!(
                "<col min=\"{}\" max=\"{}\" width=\"{width}\" customWidth=\"1\"/>",
                first + 1,
                last + 1
            ));
        }
        xml.push_str("</cols>");
    }

    if sheet.is_empty() {
        xml.push_str("<sheetData/>");
    } else {
        xml.push_str("<sheetData>");
        let mut open_row: Option<u32> = None;
        for ((row, col), value) in sheet.cells() {
            if open_row != Some(row) {
                if open_row.is_some() {
                    xml.push_str("</row>");
                }
                xml.push_str(&format!("<row r=\"{}\">", row + 1));
                open_row = Some(row);
            }
            let style = if value.contains('\n') { " s=\"1\"" } else { "" };
            xml.push_str(&format!(
                "<c r=\"{}\" t=\"inlineStr\"{style}><is><t xml:space=\"preserve\">{}</t></is></c>",
                cell_reference(row, col),
                xml_text(value)
            ));
        }
        xml.push_str("</row></sheetData>");
    }

    xml.push_str("</worksheet>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_characters_are_dropped_and_markup_escaped() {
        assert_eq!(xml_text("a<b & \u{1}c\n"), "a&lt;b &amp; c\n");
    }

    #[test]
    fn sheet_reads_back_shared_inline_and_boolean_cells() {
        let shared = vec![s!("Flight"), s!("Haikou")];
        let xml = r#"<?xml version="1.0"?>
            <worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
              <sheetViews><sheetView workbookViewId="0">
                <pane ySplit="1" topLeftCell="A2" activePane="bottomLeft" state="frozen"/>
              </sheetView></sheetViews>
              <cols><col min="1" max="2" width="14.5" customWidth="1"/></cols>
              <sheetData>
                <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>A &amp; B</t></is></c></row>
                <row r="3"><c t="s"><v>1</v></c><c t="b"><v>1</v></c><c><f>1+1</f><v>2</v></c></row>
              </sheetData>
            </worksheet>"#;
        let sheet = parse_sheet(s!("Latest"), xml, &shared, "sheet1.xml").unwrap();
        assert_eq!(sheet.cell(0, 0), Some("Flight"));
        assert_eq!(sheet.cell(0, 1), Some("A & B"));
        assert_eq!(sheet.cell(2, 0), Some("Haikou"));
        assert_eq!(sheet.cell(2, 1), Some("TRUE"));
        assert_eq!(sheet.cell(2, 2), Some("2"));
        assert_eq!(sheet.column_width(1), Some(14.5));
        assert!(sheet.freeze_header());
    }

    #[test]
    fn shared_strings_skip_phonetic_runs() {
        let xml = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
            <si><t>plain</t></si>
            <si><r><t>rich </t></r><r><t>text</t></r><rPh sb="0" eb="1"><t>ignored</t></rPh></si>
            <si><t/></si>
        </sst>"#;
        assert_eq!(parse_shared_strings(xml).unwrap(), vec![s!("plain"), s!("rich text"), s!()]);
    }

    #[test]
    fn workbook_lists_sheets_with_relationship_ids() {
        let mut book = Workbook::new();
        book.reset_sheet("Latest & Greatest").unwrap();
        book.reset_sheet("2026-10-19").unwrap();
        let parsed = parse_workbook(&workbook_xml(&book)).unwrap();
        assert_eq!(
            parsed,
            vec![
                (s!("Latest & Greatest"), s!("rId1")),
                (s!("2026-10-19"), s!("rId2")),
            ]
        );
        let rels = parse_relationships(&workbook_rels_xml(&book)).unwrap();
        assert_eq!(rels.get("rId2").map(|t| resolve_target(t)), Some(s!("xl/worksheets/sheet2.xml")));
    }

    #[test]
    fn core_properties_round_trip() {
        let props = Properties {
            creator: None,
            description: Some(s!("Data fetched from https://example.com/?a=1&b=2 on 2026-10-19T08:30:00")),
            last_modified_by: Some(s!("hanair-data automation")),
            created: DateTime::parse_from_rfc3339("2026-10-01T00:00:00Z").ok().map(|d| d.with_timezone(&Utc)),
            modified: DateTime::parse_from_rfc3339("2026-10-19T00:30:00Z").ok().map(|d| d.with_timezone(&Utc)),
        };
        assert_eq!(parse_core_properties(&core_xml(&props)).unwrap(), props);
    }

    #[test]
    fn written_sheet_parses_back() {
        let mut sheet = Sheet::new("Latest");
        super::super::write_rows(&mut sheet, &[row!["Flight", "Note"], row!["HU7181", "Gate 3\n<delayed>"]]).unwrap();
        let back = parse_sheet(s!("Latest"), &sheet_xml(&sheet, true), &[], "sheet1.xml").unwrap();
        assert_eq!(back, sheet);
    }

    #[test]
    fn whole_row_column_range_is_written_back_as_one_span() {
        let xml = r#"<worksheet><cols><col min="1" max="16384" width="9.5"/></cols><sheetData/></worksheet>"#;
        let sheet = parse_sheet(s!("Notes"), xml, &[], "sheet1.xml").unwrap();
        assert_eq!(sheet.column_width(16383), Some(9.5));

        let written = sheet_xml(&sheet, false);
        assert_eq!(written.matches("<col ").count(), 1);
        assert!(written.contains(r#"<col min="1" max="16384" width="9.5" customWidth="1"/>"#));
    }

    #[test]
    fn width_spans_break_on_gaps_and_changes() {
        let mut sheet = Sheet::new("Latest");
        for (col, width) in [(0, 10.0), (1, 10.0), (2, 12.0), (4, 12.0)] {
            sheet.set_column_width(col, width);
        }
        assert_eq!(width_spans(&sheet), vec![(0, 1, 10.0), (2, 2, 12.0), (4, 4, 12.0)]);
    }
}
