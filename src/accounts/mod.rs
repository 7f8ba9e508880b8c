mod directory;
#[cfg(test)]
pub(crate) mod memory;
pub mod repo;
pub mod repo_types;

pub use directory::{AccountDirectory, CreateAccountError, RoleDirectory};
