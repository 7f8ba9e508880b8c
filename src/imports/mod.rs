//! Bulk admin-user import: upload intake, row validation, provisioning and
//! the one-shot results report.

mod dto;
mod error;
pub mod handlers;
mod parser;
mod provisioning;
mod records;
mod report;
pub mod results;
mod services;
mod upload;
mod validator;

pub use provisioning::Provisioner;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
