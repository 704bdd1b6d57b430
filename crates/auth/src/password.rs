//! Password hashing (§3)
//!
//! PBKDF2-HMAC-SHA256, 100,000 iterations, 16-byte random salt, 32-byte
//! derived hash. Stored as `pbkdf2-sha256$<iterations>$<salt_b64>$<hash_b64>`.
//! Verification compares in constant time.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AuthError;

const ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, ITERATIONS, &mut hash);

    Ok(format!(
        "pbkdf2-sha256${ITERATIONS}${}${}",
        STANDARD.encode(salt),
        STANDARD.encode(hash)
    ))
}

pub fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    let mut parts = stored.split('$');
    let scheme = parts.next().ok_or_else(|| AuthError::PasswordHashing("malformed hash".into()))?;
    if scheme != "pbkdf2-sha256" {
        return Err(AuthError::PasswordHashing(format!("unsupported scheme '{scheme}'")));
    }
    let iterations: u32 = parts
        .next()
        .ok_or_else(|| AuthError::PasswordHashing("missing iteration count".into()))?
        .parse()
        .map_err(|_| AuthError::PasswordHashing("invalid iteration count".into()))?;
    let salt = STANDARD
        .decode(parts.next().ok_or_else(|| AuthError::PasswordHashing("missing salt".into()))?)
        .map_err(|e| AuthError::PasswordHashing(format!("invalid salt encoding: {e}")))?;
    let expected = STANDARD
        .decode(parts.next().ok_or_else(|| AuthError::PasswordHashing("missing hash".into()))?)
        .map_err(|e| AuthError::PasswordHashing(format!("invalid hash encoding: {e}")))?;

    let mut actual = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut actual);

    Ok(bool::from(actual.ct_eq(&expected)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(hash.starts_with("pbkdf2-sha256$100000$"));
        assert!(verify_password("correct horse battery staple", &hash).unwrap());
    }

    #[test]
    fn wrong_password_is_rejected() {
        let hash = hash_password("right password").unwrap();
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn same_password_produces_different_hashes() {
        let h1 = hash_password("same password").unwrap();
        let h2 = hash_password("same password").unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("password", "not a valid hash").is_err());
    }
}
