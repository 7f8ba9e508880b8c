use std::path::Path;

use bytes::Bytes;

use super::error::ImportError;

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;
pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLS_CONTENT_TYPE: &str = "application/vnd.ms-excel";

/// An uploaded file read fully into memory by the transport.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Intake checks that run before any parsing: size, extension, and a
/// declared content type that matches the extension.
pub fn validate_upload(file: &UploadedFile) -> Result<(), ImportError> {
    if file.bytes.len() > MAX_FILE_SIZE {
        return Err(ImportError::FileTooLarge);
    }

    let extension = Path::new(&file.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let expected = match extension.as_str() {
        "xlsx" => XLSX_CONTENT_TYPE,
        "xls" => XLS_CONTENT_TYPE,
        _ => return Err(ImportError::InvalidFileType),
    };

    let declared = file
        .content_type
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if declared != expected && !declared.starts_with(&format!("{};", expected)) {
        return Err(ImportError::ContentTypeMismatch {
            content_type: declared,
            extension,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, content_type: Option<&str>, size: usize) -> UploadedFile {
        UploadedFile {
            file_name: name.into(),
            content_type: content_type.map(str::to_string),
            bytes: Bytes::from(vec![0u8; size]),
        }
    }

    #[test]
    fn accepts_matching_workbooks() {
        assert!(validate_upload(&file("users.xlsx", Some(XLSX_CONTENT_TYPE), 10)).is_ok());
        assert!(validate_upload(&file("USERS.XLS", Some(XLS_CONTENT_TYPE), 10)).is_ok());
        let with_params = format!("{}; charset=binary", XLSX_CONTENT_TYPE);
        assert!(validate_upload(&file("a.b.xlsx", Some(&with_params), 10)).is_ok());
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert!(validate_upload(&file("u.xlsx", Some(XLSX_CONTENT_TYPE), MAX_FILE_SIZE)).is_ok());
        let err = validate_upload(&file("u.xlsx", Some(XLSX_CONTENT_TYPE), MAX_FILE_SIZE + 1)).unwrap_err();
        assert!(matches!(err, ImportError::FileTooLarge));
        assert_eq!(err.to_string(), "File size exceeds 5MB limit");
    }

    #[test]
    fn rejects_other_extensions() {
        for name in ["users.csv", "users", "xlsx", "users.xlsx.exe"] {
            let err = validate_upload(&file(name, Some(XLSX_CONTENT_TYPE), 10)).unwrap_err();
            assert!(matches!(err, ImportError::InvalidFileType), "{name}");
        }
    }

    #[test]
    fn rejects_mismatched_or_missing_content_type() {
        let err = validate_upload(&file("u.xlsx", Some(XLS_CONTENT_TYPE), 10)).unwrap_err();
        assert!(matches!(err, ImportError::ContentTypeMismatch { .. }));
        let err = validate_upload(&file("u.xlsx", None, 10)).unwrap_err();
        assert!(matches!(err, ImportError::ContentTypeMismatch { .. }));
    }
}
