//! Workbook reader
//!
//! Walks `xl/workbook.xml` and its relationships to find each sheet part,
//! then tokenises the sheet XML into rows of cells. Styles, formulas and
//! merged ranges are ignored.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rustc_hash::FxHashMap;
use zip::ZipArchive;
use zip::result::ZipError;

use super::cell::column_index;
use super::{CellValue, SpreadsheetReader, WorkbookSheet};
use crate::error::WorkbookError;

const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const WORKBOOK: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";

/// Largest decompressed part accepted
pub const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;
/// Upper bound on the buffer preallocated from a declared entry size
const PREALLOC_BYTES: u64 = 1024 * 1024;
/// Columns kept per row: labels and values in A and B, forecast means up to D
pub const MAX_READ_COLUMNS: usize = 4;

/// Stateless OOXML reader
#[derive(Debug, Clone, Copy, Default)]
pub struct OoxmlReader;

impl OoxmlReader {
    pub fn read_path(&self, path: &Path) -> Result<Vec<WorkbookSheet>, WorkbookError> {
        let file = File::open(path)?;
        self.read_from(BufReader::new(file))
    }

    pub fn from_bytes(&self, bytes: &[u8]) -> Result<Vec<WorkbookSheet>, WorkbookError> {
        self.read_from(Cursor::new(bytes))
    }

    /// Every sheet in workbook order
    pub fn read_from<R: Read + Seek>(
        &self,
        reader: R,
    ) -> Result<Vec<WorkbookSheet>, WorkbookError> {
        let mut archive = ZipArchive::new(reader)?;

        let shared = match read_part(&mut archive, SHARED_STRINGS)? {
            Some(bytes) => parse_shared_strings(&bytes)?,
            None => Vec::new(),
        };
        let workbook = read_part(&mut archive, WORKBOOK)?.ok_or_else(|| missing(WORKBOOK))?;
        let rels = read_part(&mut archive, WORKBOOK_RELS)?.ok_or_else(|| missing(WORKBOOK_RELS))?;
        let targets = parse_relationships(&rels)?;

        let mut sheets = Vec::new();
        for (name, rel_id) in parse_sheet_list(&workbook)? {
            let target = targets
                .get(&rel_id)
                .ok_or_else(|| WorkbookError::MissingRelationship {
                    sheet: name.clone(),
                    rel_id: rel_id.clone(),
                })?;
            let part = resolve_target(target);
            let bytes =
                read_part(&mut archive, &part)?.ok_or_else(|| WorkbookError::MissingSheetPart {
                    sheet: name.clone(),
                    part: part.clone(),
                })?;
            let rows = parse_sheet(&part, &bytes, &shared)?;
            tracing::trace!(sheet = %name, part = %part, rows = rows.len(), "sheet parsed");
            sheets.push(WorkbookSheet { name, rows });
        }
        Ok(sheets)
    }
}

impl SpreadsheetReader for OoxmlReader {
    fn read_sheets(&self, path: &Path) -> Result<Vec<WorkbookSheet>, WorkbookError> {
        self.read_path(path)
    }
}

fn missing(part: &str) -> WorkbookError {
    WorkbookError::MalformedWorkbook {
        part: part.to_string(),
    }
}

fn xml_error(part: &str, err: impl fmt::Display) -> WorkbookError {
    WorkbookError::Xml {
        part: part.to_string(),
        message: err.to_string(),
    }
}

/// Part contents, or `None` if the archive has no such entry
fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, WorkbookError> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    // The declared size is untrusted
    let hint = file.size().min(PREALLOC_BYTES);
    read_limited(file, name, hint, MAX_PART_BYTES).map(Some)
}

fn read_limited(
    reader: impl Read,
    part: &str,
    hint: u64,
    limit: u64,
) -> Result<Vec<u8>, WorkbookError> {
    let mut bytes = Vec::with_capacity(usize::try_from(hint).unwrap_or(0));
    reader.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(WorkbookError::PartTooLarge {
            part: part.to_string(),
            limit,
        });
    }
    Ok(bytes)
}

/// Relationship targets are relative to `xl/` unless rooted
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(rooted) => rooted.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

fn attr(part: &str, e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, WorkbookError> {
    for a in e.attributes() {
        let a = a.map_err(|err| xml_error(part, err))?;
        if a.key.local_name().as_ref() == key {
            let value = a.unescape_value().map_err(|err| xml_error(part, err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn parse_shared_strings(bytes: &[u8]) -> Result<Vec<String>, WorkbookError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    // Phonetic guides carry their own <t> runs
    let mut in_phonetic = false;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(SHARED_STRINGS, e))?
        {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" if !in_phonetic => in_text = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t.unescape().map_err(|e| xml_error(SHARED_STRINGS, e))?;
                if let Some(s) = current.as_mut() {
                    s.push_str(&text);
                }
            }
            Event::CData(c) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// `(sheet name, relationship id)` in workbook order
fn parse_sheet_list(bytes: &[u8]) -> Result<Vec<(String, String)>, WorkbookError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(|e| xml_error(WORKBOOK, e))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr(WORKBOOK, &e, b"name")?;
                let rel_id = attr(WORKBOOK, &e, b"id")?;
                match (name, rel_id) {
                    (Some(name), Some(rel_id)) => sheets.push((name, rel_id)),
                    _ => return Err(xml_error(WORKBOOK, "sheet entry needs `name` and `r:id`")),
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

/// Relationship id to target
fn parse_relationships(bytes: &[u8]) -> Result<FxHashMap<String, String>, WorkbookError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut targets = FxHashMap::default();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(WORKBOOK_RELS, e))?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (
                    attr(WORKBOOK_RELS, &e, b"Id")?,
                    attr(WORKBOOK_RELS, &e, b"Target")?,
                ) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(targets)
}

#[derive(Debug, Default)]
struct PendingCell {
    column: usize,
    kind: Option<String>,
    value: Option<String>,
    inline: Option<String>,
}

impl PendingCell {
    fn resolve(self, shared: &[String]) -> CellValue {
        match self.kind.as_deref() {
            Some("s") => {
                let raw = self.value.unwrap_or_default();
                match raw.trim().parse::<usize>().ok().and_then(|i| shared.get(i)) {
                    Some(s) => CellValue::Text(s.clone()),
                    None => CellValue::Text(raw),
                }
            }
            Some("inlineStr") => CellValue::Text(self.inline.or(self.value).unwrap_or_default()),
            Some("str" | "e") => CellValue::Text(self.value.unwrap_or_default()),
            _ => match (self.value, self.inline) {
                (Some(v), _) => match v.trim().parse::<f64>() {
                    Ok(n) => CellValue::Number(n),
                    Err(_) => CellValue::Text(v),
                },
                (None, Some(s)) => CellValue::Text(s),
                (None, None) => CellValue::Empty,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    Value,
    Inline,
}

fn place(row: &mut Vec<CellValue>, column: usize, value: CellValue) {
    if column >= MAX_READ_COLUMNS {
        return;
    }
    if row.len() <= column {
        row.resize(column + 1, CellValue::Empty);
    }
    row[column] = value;
}

/// Rows in document order; row numbers are not preserved, column
/// positions are. Cells past [`MAX_READ_COLUMNS`] are dropped.
fn parse_sheet(
    part: &str,
    bytes: &[u8],
    shared: &[String],
) -> Result<Vec<Vec<CellValue>>, WorkbookError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut rows = Vec::new();
    let mut row: Option<Vec<CellValue>> = None;
    let mut next_column = 0usize;
    let mut cell: Option<PendingCell> = None;
    let mut capture = Capture::None;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| xml_error(part, e))? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row = Some(Vec::new());
                    next_column = 0;
                }
                b"c" => {
                    let column = attr(part, &e, b"r")?
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_column);
                    cell = Some(PendingCell {
                        column,
                        kind: attr(part, &e, b"t")?,
                        ..PendingCell::default()
                    });
                }
                b"v" if cell.is_some() => capture = Capture::Value,
                b"rPh" => in_phonetic = true,
                b"t" if cell.is_some() && !in_phonetic => {
                    capture = Capture::Inline;
                    if let Some(c) = cell.as_mut() {
                        c.inline.get_or_insert_with(String::new);
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => rows.push(Vec::new()),
                b"c" => {
                    let column = attr(part, &e, b"r")?
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_column);
                    next_column = column + 1;
                }
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"row" => rows.push(row.take().unwrap_or_default()),
                b"c" => {
                    if let Some(pending) = cell.take() {
                        let column = pending.column;
                        next_column = column + 1;
                        if let Some(r) = row.as_mut() {
                            place(r, column, pending.resolve(shared));
                        }
                    }
                    capture = Capture::None;
                }
                b"v" | b"t" => capture = Capture::None,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Text(t) if capture != Capture::None => {
                let text = t.unescape().map_err(|e| xml_error(part, e))?;
                push_capture(cell.as_mut(), capture, &text);
            }
            Event::CData(c) if capture != Capture::None => {
                push_capture(cell.as_mut(), capture, &String::from_utf8_lossy(&c));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

fn push_capture(cell: Option<&mut PendingCell>, capture: Capture, text: &str) {
    let Some(cell) = cell else { return };
    let target = match capture {
        Capture::Value => cell.value.get_or_insert_with(String::new),
        Capture::Inline => cell.inline.get_or_insert_with(String::new),
        Capture::None => return,
    };
    target.push_str(text);
}
