//! At-rest message encryption (§4.8)
//!
//! Text content is AEAD-sealed with AES-256-GCM using a server-configured
//! 32-byte key. Each record stores `nonce(12) || ciphertext || tag(16)`
//! base64-encoded behind an `"enc:"` prefix so it survives a text column.
//! The key is read from `WHISPR_MESSAGE_ENCRYPTION_KEY` (base64); setting
//! `WHISPR_DEV_SKIP_MESSAGE_ENCRYPTION=1` stores content as plaintext
//! instead, for local development without a provisioned key.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{ChatError, ChatResult};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const ENC_PREFIX: &str = "enc:";

const KEY_ENV: &str = "WHISPR_MESSAGE_ENCRYPTION_KEY";
const DEV_BYPASS_ENV: &str = "WHISPR_DEV_SKIP_MESSAGE_ENCRYPTION";

pub enum MessageCipher {
    Sealed { cipher: Aes256Gcm },
    DevBypass,
}

impl MessageCipher {
    /// Builds a cipher from `WHISPR_MESSAGE_ENCRYPTION_KEY`, or returns the
    /// development bypass if `WHISPR_DEV_SKIP_MESSAGE_ENCRYPTION=1` is set.
    /// A missing key without the bypass is a configuration error — §4.8
    /// requires the key "when persistence is enabled unless the explicit
    /// development bypass is set".
    pub fn from_env() -> ChatResult<Self> {
        if std::env::var(DEV_BYPASS_ENV).as_deref() == Ok("1") {
            tracing::warn!("message encryption disabled via development bypass");
            return Ok(Self::DevBypass);
        }

        let encoded = std::env::var(KEY_ENV)
            .map_err(|_| ChatError::Config(format!("{KEY_ENV} is not set and {DEV_BYPASS_ENV} is not enabled")))?;
        Self::from_base64_key(&encoded)
    }

    pub fn from_base64_key(encoded: &str) -> ChatResult<Self> {
        let bytes = STANDARD.decode(encoded.trim()).map_err(|e| ChatError::Config(format!("invalid base64 key: {e}")))?;
        if bytes.len() != KEY_LEN {
            return Err(ChatError::Config(format!("message encryption key must be {KEY_LEN} bytes, got {}", bytes.len())));
        }
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(Self::Sealed { cipher: Aes256Gcm::new(key) })
    }

    pub fn seal(&self, plaintext: &str) -> ChatResult<String> {
        match self {
            Self::DevBypass => Ok(plaintext.to_string()),
            Self::Sealed { cipher } => {
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let ciphertext = cipher
                    .encrypt(&nonce, plaintext.as_bytes())
                    .map_err(|e| ChatError::Crypto(e.to_string()))?;

                let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
                sealed.extend_from_slice(&nonce);
                sealed.extend_from_slice(&ciphertext);

                Ok(format!("{ENC_PREFIX}{}", STANDARD.encode(sealed)))
            }
        }
    }

    /// Decrypts a stored value. Content without the `"enc:"` prefix is
    /// returned unchanged — the development bypass path, or a record
    /// written while the bypass was active.
    pub fn open(&self, stored: &str) -> ChatResult<String> {
        let Some(encoded) = stored.strip_prefix(ENC_PREFIX) else {
            return Ok(stored.to_string());
        };

        let Self::Sealed { cipher } = self else {
            return Err(ChatError::Crypto("encrypted record but no key configured".into()));
        };

        let sealed = STANDARD.decode(encoded).map_err(|e| ChatError::Crypto(e.to_string()))?;
        if sealed.len() < NONCE_LEN {
            return Err(ChatError::Crypto("sealed record shorter than nonce".into()));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|e| ChatError::Crypto(e.to_string()))?;
        String::from_utf8(plaintext).map_err(|e| ChatError::Crypto(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> String {
        STANDARD.encode([7u8; KEY_LEN])
    }

    #[test]
    fn seal_and_open_round_trip() {
        let cipher = MessageCipher::from_base64_key(&test_key()).unwrap();
        let sealed = cipher.seal("hello there").unwrap();
        assert!(sealed.starts_with(ENC_PREFIX));
        assert_eq!(cipher.open(&sealed).unwrap(), "hello there");
    }

    #[test]
    fn sealed_values_are_not_deterministic() {
        let cipher = MessageCipher::from_base64_key(&test_key()).unwrap();
        let a = cipher.seal("same content").unwrap();
        let b = cipher.seal("same content").unwrap();
        assert_ne!(a, b, "random nonce must vary each call");
    }

    #[test]
    fn dev_bypass_stores_plaintext() {
        let cipher = MessageCipher::DevBypass;
        let sealed = cipher.seal("plain").unwrap();
        assert_eq!(sealed, "plain");
        assert_eq!(cipher.open(&sealed).unwrap(), "plain");
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        let short = STANDARD.encode([1u8; 16]);
        let result = MessageCipher::from_base64_key(&short);
        assert!(matches!(result, Err(ChatError::Config(_))));
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let cipher = MessageCipher::from_base64_key(&test_key()).unwrap();
        let mut sealed = cipher.seal("authentic").unwrap();
        sealed.push('A');
        assert!(cipher.open(&sealed).is_err());
    }
}
