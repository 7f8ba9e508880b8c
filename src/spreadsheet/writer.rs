use std::fmt::Write as _;
use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::{CellValue, SpreadsheetError};

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const CONTENT_TYPES: &str = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const STYLES: &str = r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#;

/// Shape of the single worksheet produced by [`encode`].
#[derive(Debug, Clone, Copy)]
pub struct SheetLayout<'a> {
    pub name: &'a str,
    pub header: &'a [&'a str],
    /// Column widths in characters; may be shorter than `header` or empty.
    pub widths: &'a [f64],
}

/// Writes a one-sheet workbook. Output is byte-for-byte stable for equal input.
pub fn encode(layout: &SheetLayout<'_>, rows: &[Vec<CellValue>]) -> Result<Vec<u8>, SpreadsheetError> {
    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", format!("{XML_DECL}{CONTENT_TYPES}")),
        ("_rels/.rels", root_rels()),
        ("xl/workbook.xml", workbook_xml(layout.name)),
        ("xl/_rels/workbook.xml.rels", workbook_rels()),
        ("xl/styles.xml", format!(r#"{XML_DECL}<styleSheet xmlns="{MAIN_NS}">{STYLES}</styleSheet>"#)),
        ("xl/worksheets/sheet1.xml", sheet_xml(layout, rows)),
    ];

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut cursor);
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);

        for (name, body) in parts {
            zip.start_file(name, options)?;
            zip.write_all(body.as_bytes())?;
        }
        zip.finish()?;
    }
    Ok(cursor.into_inner())
}

fn root_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
    )
}

fn workbook_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="{REL_NS}/styles" Target="styles.xml"/></Relationships>"#
    )
}

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        r#"{XML_DECL}<workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        escape(&xml_safe(sheet_name))
    )
}

fn sheet_xml(layout: &SheetLayout<'_>, rows: &[Vec<CellValue>]) -> String {
    let mut xml = format!(r#"{XML_DECL}<worksheet xmlns="{MAIN_NS}">"#);

    if !layout.widths.is_empty() {
        xml.push_str("<cols>");
        for (i, width) in layout.widths.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<col min="{n}" max="{n}" width="{width}" customWidth="1"/>"#,
                n = i + 1
            );
        }
        xml.push_str("</cols>");
    }

    xml.push_str("<sheetData>");
    let header: Vec<CellValue> = layout.header.iter().map(|h| CellValue::from(*h)).collect();
    write_row(&mut xml, 1, &header);
    for (i, row) in rows.iter().enumerate() {
        write_row(&mut xml, i + 2, row);
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn write_row(xml: &mut String, row_number: usize, cells: &[CellValue]) {
    let _ = write!(xml, r#"<row r="{row_number}">"#);
    for (col, value) in cells.iter().enumerate() {
        let reference = format!("{}{}", column_name(col), row_number);
        match value {
            CellValue::Empty => {}
            CellValue::Text(text) => {
                let text = xml_safe(text);
                let space = if text.trim() != text { r#" xml:space="preserve""# } else { "" };
                let _ = write!(
                    xml,
                    r#"<c r="{reference}" t="inlineStr"><is><t{space}>{}</t></is></c>"#,
                    escape(&text)
                );
            }
            CellValue::Number(n) if n.is_finite() => {
                let _ = write!(xml, r#"<c r="{reference}"><v>{n}</v></c>"#);
            }
            CellValue::Number(_) => {}
            CellValue::Bool(b) => {
                let _ = write!(xml, r#"<c r="{reference}" t="b"><v>{}</v></c>"#, u8::from(*b));
            }
        }
    }
    xml.push_str("</row>");
}

/// Zero-based column index to spreadsheet letters (`0` -> `A`, `26` -> `AA`).
pub(super) fn column_name(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(char::from(b'A' + (index % 26) as u8));
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

// XML 1.0 forbids most C0 control characters, even escaped.
fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}
