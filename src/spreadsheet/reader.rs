use std::collections::HashMap;
use std::fmt::Display;
use std::io::{Cursor, Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use zip::result::ZipError;
use zip::ZipArchive;

use super::{CellValue, RawRow, SpreadsheetError};

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const DEFAULT_SHEET_PART: &str = "xl/worksheets/sheet1.xml";
// Uploads are capped at a few MiB, so anything inflating past this is hostile.
const MAX_PART_SIZE: u64 = 64 * 1024 * 1024;
const EMPTY_HEADER: &str = "__EMPTY";
/// Widest sheet Excel can produce (`XFD`).
const MAX_COLUMNS: usize = 16_384;

/// Reads the first worksheet of an `.xlsx` package into header-keyed rows.
///
/// The first non-blank row is the header. Entirely blank data rows are
/// skipped; additional sheets are ignored. Reading stops with
/// [`SpreadsheetError::TooManyRows`] as soon as more than `max_rows` data
/// rows have been seen.
pub fn decode(bytes: &[u8], max_rows: usize) -> Result<Vec<RawRow>, SpreadsheetError> {
    if bytes.starts_with(&OLE_MAGIC) {
        return Err(SpreadsheetError::Malformed(
            "Legacy .xls workbooks are not supported, save the file as .xlsx".into(),
        ));
    }

    let mut zip = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| malformed(format!("File is not a recognizable spreadsheet: {e}")))?;

    let workbook = read_part(&mut zip, WORKBOOK_PART)?
        .ok_or_else(|| malformed("File is not a recognizable spreadsheet: missing workbook"))?;
    let sheet_rel = first_sheet_relationship(&workbook)?.ok_or(SpreadsheetError::NoSheets)?;

    let sheet_path = match read_part(&mut zip, WORKBOOK_RELS_PART)? {
        Some(rels) => {
            let targets = parse_relationships(&rels)?;
            let target = targets
                .get(&sheet_rel)
                .ok_or_else(|| malformed(format!("Unresolved worksheet relationship {sheet_rel}")))?;
            resolve_target(target)
        }
        None => DEFAULT_SHEET_PART.to_string(),
    };

    let shared = match read_part(&mut zip, SHARED_STRINGS_PART)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet = read_part(&mut zip, &sheet_path)?
        .ok_or_else(|| malformed(format!("Missing worksheet part {sheet_path}")))?;
    let grid = parse_sheet(&sheet, &shared, max_rows)?;

    let rows = rows_by_header(grid);
    if rows.is_empty() {
        return Err(SpreadsheetError::NoDataRows);
    }
    Ok(rows)
}

fn malformed(e: impl Display) -> SpreadsheetError {
    SpreadsheetError::Malformed(e.to_string())
}

fn read_part<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, SpreadsheetError> {
    let entry = match zip.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(malformed(format!("Unreadable part {name}: {e}"))),
    };
    if entry.size() > MAX_PART_SIZE {
        return Err(malformed(format!("Part {name} is too large")));
    }

    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry
        .take(MAX_PART_SIZE + 1)
        .read_to_end(&mut buf)
        .map_err(|e| malformed(format!("Unreadable part {name}: {e}")))?;
    if buf.len() as u64 > MAX_PART_SIZE {
        return Err(malformed(format!("Part {name} is too large")));
    }
    Ok(Some(buf))
}

fn attr(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>, SpreadsheetError> {
    for a in e.attributes() {
        let a = a.map_err(malformed)?;
        if a.key.local_name().as_ref() == local {
            return Ok(Some(a.unescape_value().map_err(malformed)?.into_owned()));
        }
    }
    Ok(None)
}

/// Relationship id (`r:id`) of the first `<sheet>` in the workbook part.
fn first_sheet_relationship(xml: &[u8]) -> Result<Option<String>, SpreadsheetError> {
    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(malformed)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                return attr(&e, b"id")?
                    .map(Some)
                    .ok_or_else(|| malformed("Sheet entry without a relationship id"));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, SpreadsheetError> {
    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();
    let mut targets = HashMap::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(malformed)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, b"Id")?, attr(&e, b"Target")?) {
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

// Workbook relationship targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, SpreadsheetError> {
    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf).map_err(malformed)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text => current.push_str(&t.unescape().map_err(malformed)?),
            Event::CData(c) if in_text => current.push_str(&String::from_utf8_lossy(&c)),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

struct OpenCell {
    col: usize,
    kind: Option<String>,
    raw: String,
}

/// Non-empty cells of every non-blank `<row>`, in document order, as
/// `(column, value)`. The header plus at most `max_rows` rows are kept.
fn parse_sheet(
    xml: &[u8],
    shared: &[String],
    max_rows: usize,
) -> Result<Vec<Vec<(usize, CellValue)>>, SpreadsheetError> {
    let row_limit = max_rows.saturating_add(1);
    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows: Vec<Vec<(usize, CellValue)>> = Vec::new();
    let mut row: Option<Vec<(usize, CellValue)>> = None;
    let mut next_col = 0usize;
    let mut cell: Option<OpenCell> = None;
    let mut in_value = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf).map_err(malformed)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row = Some(Vec::new());
                    next_col = 0;
                }
                b"c" => {
                    let col = cell_column(&e, next_col)?;
                    next_col = col + 1;
                    cell = Some(OpenCell { col, kind: attr(&e, b"t")?, raw: String::new() });
                }
                b"rPh" => phonetic_depth += 1,
                b"v" | b"t" if cell.is_some() && phonetic_depth == 0 => in_value = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                next_col = cell_column(&e, next_col)? + 1;
            }
            Event::Text(t) if in_value => {
                if let Some(open) = cell.as_mut() {
                    open.raw.push_str(&t.unescape().map_err(malformed)?);
                }
            }
            Event::CData(c) if in_value => {
                if let Some(open) = cell.as_mut() {
                    open.raw.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"c" => {
                    if let (Some(open), Some(cells)) = (cell.take(), row.as_mut()) {
                        let value = cell_value(&open, shared)?;
                        if value != CellValue::Empty {
                            if cells.len() >= MAX_COLUMNS {
                                return Err(malformed(format!(
                                    "Row has more than {MAX_COLUMNS} cells"
                                )));
                            }
                            cells.push((open.col, value));
                        }
                    }
                }
                b"row" => {
                    let cells = row.take().filter(|c| c.iter().any(|(_, v)| !v.is_blank()));
                    if let Some(mut cells) = cells {
                        if rows.len() == row_limit {
                            return Err(SpreadsheetError::TooManyRows { max: max_rows });
                        }
                        cells.sort_by_key(|(col, _)| *col);
                        rows.push(cells);
                    }
                }
                b"sheetData" => break,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

/// Column of a `<c>` element: its `r` reference, or the slot after the
/// previous cell when the reference is absent.
fn cell_column(e: &BytesStart<'_>, next: usize) -> Result<usize, SpreadsheetError> {
    let col = match attr(e, b"r")? {
        Some(reference) => column_index(&reference)
            .ok_or_else(|| malformed(format!("Invalid cell reference {reference:?}")))?,
        None => next,
    };
    if col >= MAX_COLUMNS {
        return Err(malformed(format!(
            "Cell column {} is beyond the last spreadsheet column",
            col + 1
        )));
    }
    Ok(col)
}

/// Zero-based column of an `A1`-style reference (`"C7"` -> `2`). `None` for
/// references without letters or past column `XFD`.
fn column_index(reference: &str) -> Option<usize> {
    let mut col = 0usize;
    for b in reference.bytes().take_while(u8::is_ascii_alphabetic) {
        col = col * 26 + usize::from(b.to_ascii_uppercase() - b'A' + 1);
        if col > MAX_COLUMNS {
            return None;
        }
    }
    col.checked_sub(1)
}

fn cell_value(cell: &OpenCell, shared: &[String]) -> Result<CellValue, SpreadsheetError> {
    let raw = cell.raw.as_str();
    let value = match cell.kind.as_deref() {
        Some("s") => {
            let index: usize = raw
                .trim()
                .parse()
                .map_err(|_| malformed(format!("Invalid shared string index {raw:?}")))?;
            let text = shared
                .get(index)
                .ok_or_else(|| malformed(format!("Shared string index {index} out of range")))?;
            CellValue::Text(text.clone())
        }
        Some("inlineStr") | Some("str") => CellValue::Text(raw.to_string()),
        Some("b") => CellValue::Bool(raw.trim() == "1"),
        Some("e") => CellValue::Empty,
        _ if raw.trim().is_empty() => CellValue::Empty,
        _ => CellValue::Number(
            raw.trim()
                .parse()
                .map_err(|_| malformed(format!("Invalid numeric cell value {raw:?}")))?,
        ),
    };
    Ok(value)
}

fn rows_by_header(grid: Vec<Vec<(usize, CellValue)>>) -> Vec<RawRow> {
    let mut rows = grid
        .into_iter()
        .filter(|cells| cells.iter().any(|(_, v)| !v.is_blank()));
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let data: Vec<_> = rows.collect();

    let width = header
        .iter()
        .chain(data.iter().flatten())
        .map(|(col, _)| col + 1)
        .max()
        .unwrap_or(0);
    let names = header_names(&header, width);

    data.into_iter()
        .map(|cells| {
            cells
                .into_iter()
                .map(|(col, value)| (names[col].clone(), value))
                .collect()
        })
        .collect()
}

fn header_names(header: &[(usize, CellValue)], width: usize) -> Vec<String> {
    let by_col: HashMap<usize, String> = header
        .iter()
        .map(|(col, v)| (*col, v.to_display_string().trim().to_string()))
        .collect();

    let mut seen: HashMap<String, usize> = HashMap::new();
    (0..width)
        .map(|col| {
            let base = match by_col.get(&col) {
                Some(name) if !name.is_empty() => name.clone(),
                _ => EMPTY_HEADER.to_string(),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 { base } else { format!("{base}_{count}") };
            *count += 1;
            name
        })
        .collect()
}
