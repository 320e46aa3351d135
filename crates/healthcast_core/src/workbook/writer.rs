//! Workbook writer
//!
//! Produces the smallest package spreadsheet applications open without
//! complaint: content types, package and workbook relationships, a static
//! stylesheet, and one worksheet part per sheet with inline-string cells.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::cell::{cell_ref, sanitize_sheet_name};
use super::xml::XmlBuilder;
use super::{CellValue, SpreadsheetWriter, WorkbookSheet};
use crate::error::WorkbookError;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

const REL_OFFICE_DOC: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

const CT_RELS: &str = "application/vnd.openxmlformats-package.relationships+xml";
const CT_WORKBOOK: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const CT_STYLES: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

/// One font, fill, border and cell format: the default "Normal" style
const STYLES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="1"><font><sz val="11"/><color theme="1"/><name val="Calibri"/><family val="2"/><scheme val="minor"/></font></fonts>"#,
    r#"<fills count="1"><fill><patternFill patternType="none"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    "</styleSheet>"
);

/// Stateless OOXML writer
#[derive(Debug, Clone, Copy, Default)]
pub struct OoxmlWriter;

impl OoxmlWriter {
    /// The complete archive in memory. Identical input gives identical bytes.
    pub fn to_bytes(&self, sheets: &[WorkbookSheet]) -> Result<Vec<u8>, WorkbookError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        put_part(&mut zip, options, "[Content_Types].xml", &content_types_xml(sheets.len()))?;
        put_part(&mut zip, options, "_rels/.rels", &package_rels_xml())?;
        put_part(&mut zip, options, "xl/workbook.xml", &workbook_xml(sheets))?;
        let workbook_rels = workbook_rels_xml(sheets.len());
        put_part(&mut zip, options, "xl/_rels/workbook.xml.rels", &workbook_rels)?;
        put_part(&mut zip, options, "xl/styles.xml", STYLES_XML)?;
        for (i, sheet) in sheets.iter().enumerate() {
            let name = format!("xl/worksheets/sheet{}.xml", i + 1);
            put_part(&mut zip, options, &name, &sheet_xml(&sheet.rows))?;
        }

        Ok(zip.finish()?.into_inner())
    }

    /// Write to `path` through a sibling temp file, so a failed run never
    /// leaves a truncated workbook behind
    pub fn write(&self, path: &Path, sheets: &[WorkbookSheet]) -> Result<(), WorkbookError> {
        let bytes = self.to_bytes(sheets)?;
        let tmp = temp_path(path);
        fs::write(&tmp, &bytes)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        tracing::debug!(
            path = %path.display(),
            sheets = sheets.len(),
            bytes = bytes.len(),
            "workbook written"
        );
        Ok(())
    }
}

impl SpreadsheetWriter for OoxmlWriter {
    fn write_sheets(&self, path: &Path, sheets: &[WorkbookSheet]) -> Result<(), WorkbookError> {
        self.write(path, sheets)
    }
}

fn put_part(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    name: &str,
    body: &str,
) -> Result<(), WorkbookError> {
    zip.start_file(name, options)?;
    zip.write_all(body.as_bytes())?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook.xlsx".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}

fn content_types_xml(sheet_count: usize) -> String {
    let mut xml = XmlBuilder::document();
    xml.open("Types", &[("xmlns", NS_TYPES)])
        .empty("Default", &[("Extension", "rels"), ("ContentType", CT_RELS)])
        .empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])
        .empty("Override", &[("PartName", "/xl/workbook.xml"), ("ContentType", CT_WORKBOOK)])
        .empty("Override", &[("PartName", "/xl/styles.xml"), ("ContentType", CT_STYLES)]);
    for i in 1..=sheet_count {
        let part = format!("/xl/worksheets/sheet{i}.xml");
        xml.empty("Override", &[("PartName", part.as_str()), ("ContentType", CT_WORKSHEET)]);
    }
    xml.finish()
}

fn package_rels_xml() -> String {
    let mut xml = XmlBuilder::document();
    xml.open("Relationships", &[("xmlns", NS_PKG_REL)]).empty(
        "Relationship",
        &[("Id", "rId1"), ("Type", REL_OFFICE_DOC), ("Target", "xl/workbook.xml")],
    );
    xml.finish()
}

fn workbook_xml(sheets: &[WorkbookSheet]) -> String {
    let mut xml = XmlBuilder::document();
    xml.open("workbook", &[("xmlns", NS_MAIN), ("xmlns:r", NS_REL)])
        .open("sheets", &[]);
    for (i, sheet) in sheets.iter().enumerate() {
        let name = sanitize_sheet_name(&sheet.name);
        let id = (i + 1).to_string();
        let rel = format!("rId{id}");
        xml.empty(
            "sheet",
            &[("name", name.as_str()), ("sheetId", id.as_str()), ("r:id", rel.as_str())],
        );
    }
    xml.finish()
}

/// Worksheets take `rId1..=rIdN`, the stylesheet `rId{N+1}`
fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut xml = XmlBuilder::document();
    xml.open("Relationships", &[("xmlns", NS_PKG_REL)]);
    for i in 1..=sheet_count {
        let id = format!("rId{i}");
        let target = format!("worksheets/sheet{i}.xml");
        xml.empty(
            "Relationship",
            &[("Id", id.as_str()), ("Type", REL_WORKSHEET), ("Target", target.as_str())],
        );
    }
    let styles_id = format!("rId{}", sheet_count + 1);
    xml.empty(
        "Relationship",
        &[("Id", styles_id.as_str()), ("Type", REL_STYLES), ("Target", "styles.xml")],
    );
    xml.finish()
}

/// Readers may trim unmarked edge whitespace in `<t>`
fn text_attrs(text: &str) -> &'static [(&'static str, &'static str)] {
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        &[("xml:space", "preserve")]
    } else {
        &[]
    }
}

fn sheet_xml(rows: &[Vec<CellValue>]) -> String {
    let mut xml = XmlBuilder::document();
    xml.open("worksheet", &[("xmlns", NS_MAIN)]).open("sheetData", &[]);
    for (r, row) in rows.iter().enumerate() {
        let row_number = r + 1;
        xml.open("row", &[("r", row_number.to_string().as_str())]);
        for (c, value) in row.iter().enumerate() {
            let reference = cell_ref(c, row_number);
            match value {
                CellValue::Number(v) if v.is_finite() => {
                    xml.open("c", &[("r", reference.as_str())])
                        .text_element("v", &v.to_string())
                        .close();
                }
                CellValue::Text(s) => {
                    xml.open("c", &[("r", reference.as_str()), ("t", "inlineStr")])
                        .open("is", &[])
                        .open("t", text_attrs(s))
                        .text(s)
                        .close()
                        .close()
                        .close();
                }
                // Omitted cells read back as empty
                CellValue::Number(_) | CellValue::Empty => {}
            }
        }
        xml.close();
    }
    xml.finish()
}
