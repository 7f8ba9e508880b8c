use super::error::ImportError;
use super::records::ImportBatch;
use super::validator::validate_row;
use crate::spreadsheet;

pub const MAX_USERS_PER_IMPORT: usize = 100;

/// Decodes and validates a whole upload. All-or-nothing: the first invalid
/// row fails the batch, reported with its sheet row number (header is row 1).
pub fn parse_batch(bytes: &[u8]) -> Result<ImportBatch, ImportError> {
    // The row cap is enforced while reading, before any row is materialized
    // past the limit.
    let rows = spreadsheet::decode(bytes, MAX_USERS_PER_IMPORT)?;
    if rows.is_empty() {
        return Err(ImportError::EmptyData);
    }

    let records = rows
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            validate_row(raw).map_err(|reason| ImportError::RowValidation {
                row: index + 2,
                reason,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ImportBatch::new(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::validator::RowError;
    use crate::spreadsheet::{encode, CellValue, SheetLayout};

    const LAYOUT: SheetLayout<'static> = SheetLayout {
        name: "Users",
        header: &["email", "firstname", "lastname"],
        widths: &[],
    };

    fn workbook(rows: &[[&str; 3]]) -> Vec<u8> {
        let rows: Vec<Vec<CellValue>> = rows
            .iter()
            .map(|r| r.iter().map(|c| CellValue::from(*c)).collect())
            .collect();
        encode(&LAYOUT, &rows).unwrap()
    }

    #[test]
    fn parses_valid_rows_in_order() {
        let bytes = workbook(&[["a@b.com", "Jo", "Doe"], ["C@D.org", "", "Roe"]]);
        let batch = parse_batch(&bytes).unwrap();
        let emails: Vec<_> = batch.records().iter().map(|r| r.email.as_str()).collect();
        assert_eq!(emails, vec!["a@b.com", "c@d.org"]);
        assert_eq!(batch.records()[0].firstname, "Jo");
    }

    #[test]
    fn invalid_row_fails_whole_batch_with_sheet_row_number() {
        let bytes = workbook(&[["a@b.com", "A", "B"], ["not-an-email", "", ""], ["c@d.com", "", ""]]);
        match parse_batch(&bytes).unwrap_err() {
            ImportError::RowValidation { row, reason } => {
                assert_eq!(row, 3);
                assert_eq!(reason, RowError::InvalidEmail("not-an-email".into()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn first_data_row_is_row_two() {
        let bytes = workbook(&[["not-an-email", "", ""]]);
        let err = parse_batch(&bytes).unwrap_err();
        assert_eq!(err.to_string(), "Row 2: Invalid email format: not-an-email");
    }

    #[test]
    fn header_only_file_is_empty() {
        let bytes = encode(&LAYOUT, &[]).unwrap();
        assert!(matches!(parse_batch(&bytes).unwrap_err(), ImportError::EmptyData));
    }

    #[test]
    fn oversized_batch_is_rejected_before_row_validation() {
        // Every row is invalid; the size check must still win.
        let rows: Vec<[&str; 3]> = (0..=MAX_USERS_PER_IMPORT).map(|_| ["bad", "", ""]).collect();
        let err = parse_batch(&workbook(&rows)).unwrap_err();
        assert!(matches!(err, ImportError::BatchTooLarge { max: 100 }));
        assert_eq!(err.to_string(), "Import limit exceeded. Maximum 100 users per import");
    }

    #[test]
    fn row_flood_is_cut_off_at_the_cap() {
        let rows = "<row><c t=\"b\"><v>1</v></c></row>".repeat(50_000);
        let sheet = format!(
            "<worksheet><sheetData><row><c t=\"inlineStr\"><is><t>email</t></is></c></row>{rows}</sheetData></worksheet>"
        );
        let bytes = crate::spreadsheet::test_support::single_sheet_package(&sheet);
        let err = parse_batch(&bytes).unwrap_err();
        assert!(matches!(err, ImportError::BatchTooLarge { max: MAX_USERS_PER_IMPORT }));
    }

    #[test]
    fn exactly_max_rows_is_accepted() {
        let emails: Vec<String> = (0..MAX_USERS_PER_IMPORT).map(|i| format!("u{i}@x.com")).collect();
        let rows: Vec<[&str; 3]> = emails.iter().map(|e| [e.as_str(), "", ""]).collect();
        assert_eq!(parse_batch(&workbook(&rows)).unwrap().len(), MAX_USERS_PER_IMPORT);
    }

    #[test]
    fn garbage_bytes_are_malformed() {
        assert!(matches!(
            parse_batch(b"definitely not a workbook").unwrap_err(),
            ImportError::MalformedFile(_)
        ));
    }
}
