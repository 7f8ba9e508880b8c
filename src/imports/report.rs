use super::records::ProvisionOutcome;
use crate::spreadsheet::{self, CellValue, SheetLayout, SpreadsheetError};

pub const TEMPLATE_FILE_NAME: &str = "user-import-template.xlsx";
pub const RESULTS_FILE_NAME: &str = "user-import-results.xlsx";

pub const TEMPLATE_COLUMNS: [&str; 3] = ["email", "firstname", "lastname"];
pub const TEMPLATE_SAMPLE_DATA: [[&str; 3]; 2] = [
    ["user1@example.com", "John", "Doe"],
    ["user2@example.com", "Jane", "Smith"],
];

pub const RESULTS_COLUMNS: [&str; 5] = ["Email", "First Name", "Last Name", "Invitation Link", "Status"];
const RESULTS_COLUMN_WIDTHS: [f64; 5] = [30.0, 20.0, 20.0, 80.0, 10.0];
const SUCCESS_STATUS: &str = "success";

pub fn template_workbook() -> Result<Vec<u8>, SpreadsheetError> {
    let rows: Vec<Vec<CellValue>> = TEMPLATE_SAMPLE_DATA
        .iter()
        .map(|row| row.iter().map(|cell| CellValue::from(*cell)).collect())
        .collect();
    let layout = SheetLayout {
        name: "Users",
        header: &TEMPLATE_COLUMNS,
        widths: &[],
    };
    spreadsheet::encode(&layout, &rows)
}

/// One row per successfully provisioned account; failures are reported in
/// the import summary instead.
pub fn results_workbook(outcomes: &[ProvisionOutcome]) -> Result<Vec<u8>, SpreadsheetError> {
    let rows: Vec<Vec<CellValue>> = outcomes
        .iter()
        .filter(|o| o.is_success())
        .map(|o| {
            vec![
                CellValue::from(o.record.email.as_str()),
                CellValue::from(o.record.firstname.as_str()),
                CellValue::from(o.record.lastname.as_str()),
                CellValue::from(o.invitation_link.clone().unwrap_or_default()),
                CellValue::from(SUCCESS_STATUS),
            ]
        })
        .collect();
    let layout = SheetLayout {
        name: "Import Results",
        header: &RESULTS_COLUMNS,
        widths: &RESULTS_COLUMN_WIDTHS,
    };
    spreadsheet::encode(&layout, &rows)
}
