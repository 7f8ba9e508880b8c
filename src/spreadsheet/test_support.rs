use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::ZipWriter;

/// Zips the given parts as-is, in order.
pub fn package(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut cursor);
        for (name, body) in parts {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    cursor.into_inner()
}

/// Minimal workbook whose only sheet is `sheet_xml` at the default part name.
pub fn single_sheet_package(sheet_xml: &str) -> Vec<u8> {
    package(&[
        (
            "xl/workbook.xml",
            r#"<workbook><sheets><sheet name="Users" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        ),
        ("xl/worksheets/sheet1.xml", sheet_xml),
    ])
}
