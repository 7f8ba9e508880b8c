use serde::Serialize;

use super::records::ProvisionOutcome;
use super::results::ResultId;
use crate::accounts::repo_types::Role;

/// Response of `POST /import`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub success: bool,
    pub message: String,
    pub total_processed: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<RowFailure>,
    pub result_id: ResultId,
}

#[derive(Debug, Serialize)]
pub struct RowFailure {
    pub email: String,
    pub error: String,
}

impl ImportSummary {
    pub fn new(outcomes: &[ProvisionOutcome], result_id: ResultId) -> Self {
        let errors: Vec<RowFailure> = outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| RowFailure {
                email: o.record.email.clone(),
                error: o.message.clone().unwrap_or_default(),
            })
            .collect();
        let success_count = outcomes.len() - errors.len();

        Self {
            success: true,
            message: format!("Successfully imported {} users", success_count),
            total_processed: outcomes.len(),
            success_count,
            error_count: errors.len(),
            errors,
            result_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RolesResponse {
    pub roles: Vec<Role>,
}
