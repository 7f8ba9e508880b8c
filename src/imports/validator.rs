use lazy_static::lazy_static;
use regex::Regex;

use super::records::UserRecord;
use crate::spreadsheet::{CellValue, RawRow};

pub const MAX_STRING_LENGTH: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("Missing or invalid email field")]
    MissingEmail,
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Turns one raw row into a [`UserRecord`]. Only the email can reject a row;
/// names are trimmed and clipped instead.
pub fn validate_row(raw: &RawRow) -> Result<UserRecord, RowError> {
    Ok(UserRecord {
        email: normalize_email(raw.get("email"))?,
        firstname: sanitize_string(raw.get("firstname")),
        lastname: sanitize_string(raw.get("lastname")),
    })
}

fn normalize_email(value: Option<&CellValue>) -> Result<String, RowError> {
    let email = value
        .and_then(CellValue::as_text)
        .filter(|s| !s.is_empty())
        .ok_or(RowError::MissingEmail)?
        .trim()
        .to_lowercase();

    if !is_valid_email(&email) {
        return Err(RowError::InvalidEmail(email));
    }
    Ok(email)
}

pub fn sanitize_string(value: Option<&CellValue>) -> String {
    value
        .map(|v| {
            v.to_display_string()
                .trim()
                .chars()
                .take(MAX_STRING_LENGTH)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, CellValue)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn normalizes_email_and_keeps_name_case() {
        let raw = row(&[
            ("email", CellValue::from("  Jo.Doe@Example.COM ")),
            ("firstname", CellValue::from(" Jo ")),
            ("lastname", CellValue::from("McDoe")),
        ]);
        let record = validate_row(&raw).unwrap();
        assert_eq!(record.email, "jo.doe@example.com");
        assert_eq!(record.firstname, "Jo");
        assert_eq!(record.lastname, "McDoe");
    }

    #[test]
    fn missing_names_default_to_empty() {
        let raw = row(&[("email", CellValue::from("a@b.com"))]);
        let record = validate_row(&raw).unwrap();
        assert_eq!(record.firstname, "");
        assert_eq!(record.lastname, "");
    }

    #[test]
    fn numeric_names_are_stringified() {
        let raw = row(&[
            ("email", CellValue::from("a@b.com")),
            ("firstname", CellValue::Number(7.0)),
        ]);
        assert_eq!(validate_row(&raw).unwrap().firstname, "7");
    }

    #[test]
    fn names_are_clipped_by_characters() {
        let long: String = "é".repeat(300);
        let raw = row(&[
            ("email", CellValue::from("a@b.com")),
            ("lastname", CellValue::from(long.as_str())),
        ]);
        let record = validate_row(&raw).unwrap();
        assert_eq!(record.lastname.chars().count(), MAX_STRING_LENGTH);
    }

    #[test]
    fn missing_or_non_text_email_is_rejected() {
        assert_eq!(validate_row(&row(&[])).unwrap_err(), RowError::MissingEmail);
        let numeric = row(&[("email", CellValue::Number(12.0))]);
        assert_eq!(validate_row(&numeric).unwrap_err(), RowError::MissingEmail);
        let empty = row(&[("email", CellValue::from(""))]);
        assert_eq!(validate_row(&empty).unwrap_err(), RowError::MissingEmail);
    }

    #[test]
    fn malformed_email_reports_normalized_value() {
        let raw = row(&[("email", CellValue::from(" Not-An-Email "))]);
        let err = validate_row(&raw).unwrap_err();
        assert_eq!(err, RowError::InvalidEmail("not-an-email".into()));
        assert_eq!(err.to_string(), "Invalid email format: not-an-email");

        for bad in ["a@b", "a b@c.com", "@b.com", "a@@b.com"] {
            let raw = row(&[("email", CellValue::from(bad))]);
            assert!(validate_row(&raw).is_err(), "{bad} should be rejected");
        }
    }
}
