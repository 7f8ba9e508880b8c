/// One validated spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Trimmed, lowercased, shape-checked.
    pub email: String,
    pub firstname: String,
    pub lastname: String,
}

/// Validated rows of one uploaded file, in file order.
#[derive(Debug, Clone, Default)]
pub struct ImportBatch(Vec<UserRecord>);

impl ImportBatch {
    pub fn new(records: Vec<UserRecord>) -> Self {
        Self(records)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn records(&self) -> &[UserRecord] {
        &self.0
    }

    pub fn into_records(self) -> Vec<UserRecord> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStatus {
    Success,
    DuplicateAccount,
    ProvisionError,
}

pub const DUPLICATE_ACCOUNT_MESSAGE: &str = "Admin user already exists";

/// Result of provisioning one record.
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    pub record: UserRecord,
    pub status: ProvisionStatus,
    /// Set only on success.
    pub invitation_link: Option<String>,
    /// Set only on failure.
    pub message: Option<String>,
}

impl ProvisionOutcome {
    pub fn success(record: UserRecord, invitation_link: String) -> Self {
        Self {
            record,
            status: ProvisionStatus::Success,
            invitation_link: Some(invitation_link),
            message: None,
        }
    }

    pub fn duplicate(record: UserRecord) -> Self {
        Self {
            record,
            status: ProvisionStatus::DuplicateAccount,
            invitation_link: None,
            message: Some(DUPLICATE_ACCOUNT_MESSAGE.to_string()),
        }
    }

    pub fn failed(record: UserRecord, message: impl Into<String>) -> Self {
        Self {
            record,
            status: ProvisionStatus::ProvisionError,
            invitation_link: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ProvisionStatus::Success
    }
}
