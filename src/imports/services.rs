use bytes::Bytes;
use tracing::info;

use super::dto::ImportSummary;
use super::error::ImportError;
use super::parser::parse_batch;
use super::report;
use crate::accounts::repo_types::{AdminId, RoleId};
use crate::state::AppState;

/// Parse, provision, build the report and park it for download.
///
/// Parsing finishes before the first account is touched, so any parse error
/// leaves the directory unchanged and stores nothing.
pub async fn run_import(
    state: &AppState,
    file: &[u8],
    role_id: RoleId,
    owner: AdminId,
) -> Result<ImportSummary, ImportError> {
    let batch = parse_batch(file)?;
    info!(owner, role_id, rows = batch.len(), "import batch parsed");

    let outcomes = state.provisioner.provision(batch, role_id).await;

    let report = report::results_workbook(&outcomes).map_err(ImportError::Report)?;
    let result_id = state.results.store(Bytes::from(report), owner)?;

    let summary = ImportSummary::new(&outcomes, result_id);
    info!(
        owner,
        total = summary.total_processed,
        succeeded = summary.success_count,
        failed = summary.error_count,
        result_id = %summary.result_id,
        "import finished"
    );
    Ok(summary)
}
