use serde::{Deserialize, Serialize};

use crate::accounts::repo_types::AdminId;

/// JWT payload identifying the calling admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: AdminId, // admin ID
    pub iat: usize,   // issued at (unix timestamp)
    pub exp: usize,   // expires at (unix timestamp)
    pub iss: String,  // issuer
    pub aud: String,  // audience
}
