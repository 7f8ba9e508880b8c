use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, RngCore};
use tracing::error;

/// Hashes one-time passwords before they reach the account store.
pub trait PasswordHashing: Send + Sync {
    fn hash(&self, plain: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl PasswordHashing for Argon2Hasher {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }
}

/// `len` bytes from the OS entropy source, lowercase hex encoded.
pub fn random_hex(len: usize) -> Result<String, rand::Error> {
    let mut buf = vec![0u8; len];
    OsRng.try_fill_bytes(&mut buf)?;
    Ok(hex::encode(buf))
}
