//! At-rest encryption of TOTP secrets.
//!
//! AES-256-GCM with a random 96-bit nonce per call. Stored form is
//! `v1:` followed by base64(nonce || ciphertext || tag). The secret's id is
//! bound as associated data, so a ciphertext copied onto another row fails
//! to open.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, Secret};

use super::error::ServiceError;

const VERSION_PREFIX: &str = "v1:";
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCipher(***)")
    }
}

impl SecretCipher {
    /// Build from a base64-encoded 32-byte key.
    pub fn from_base64_key(key: &Secret<String>) -> Result<Self, ServiceError> {
        let bytes = STANDARD
            .decode(key.expose_secret().trim())
            .map_err(|_| ServiceError::Crypto("encryption key is not valid base64".to_string()))?;
        Self::from_key_bytes(&bytes)
    }

    pub fn from_key_bytes(key: &[u8]) -> Result<Self, ServiceError> {
        if key.len() != KEY_LEN {
            return Err(ServiceError::Crypto(format!(
                "encryption key must be {} bytes, got {}",
                KEY_LEN,
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| ServiceError::Crypto(format!("AES init: {}", e)))?;
        Ok(Self { cipher })
    }

    /// Fresh random key, base64 encoded. Used for dev defaults and tests.
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        STANDARD.encode(key)
    }

    pub fn encrypt(&self, plaintext: &str, aad: &[u8]) -> Result<String, ServiceError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad,
                },
            )
            .map_err(|_| ServiceError::Crypto("encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", VERSION_PREFIX, STANDARD.encode(sealed)))
    }

    pub fn decrypt(&self, stored: &str, aad: &[u8]) -> Result<String, ServiceError> {
        let encoded = stored
            .strip_prefix(VERSION_PREFIX)
            .ok_or_else(|| ServiceError::Crypto("unknown ciphertext version".to_string()))?;

        let sealed = STANDARD
            .decode(encoded)
            .map_err(|_| ServiceError::Crypto("ciphertext is not valid base64".to_string()))?;

        if sealed.len() <= NONCE_LEN {
            return Err(ServiceError::Crypto("ciphertext too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);

        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| ServiceError::Crypto("decryption failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| ServiceError::Crypto("plaintext is not UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> SecretCipher {
        SecretCipher::from_base64_key(&Secret::new(SecretCipher::generate_key())).unwrap()
    }

    #[test]
    fn encrypt_then_decrypt() {
        let c = cipher();
        let sealed = c.encrypt("JBSWY3DPEHPK3PXP", b"id-1").unwrap();
        assert!(sealed.starts_with("v1:"));
        assert!(!sealed.contains("JBSWY3DPEHPK3PXP"));
        assert_eq!(c.decrypt(&sealed, b"id-1").unwrap(), "JBSWY3DPEHPK3PXP");
    }

    #[test]
    fn nonces_differ_per_call() {
        let c = cipher();
        assert_ne!(
            c.encrypt("JBSWY3DPEHPK3PXP", b"id").unwrap(),
            c.encrypt("JBSWY3DPEHPK3PXP", b"id").unwrap()
        );
    }

    #[test]
    fn wrong_associated_data_fails() {
        let c = cipher();
        let sealed = c.encrypt("JBSWY3DPEHPK3PXP", b"id-1").unwrap();
        assert!(matches!(
            c.decrypt(&sealed, b"id-2"),
            Err(ServiceError::Crypto(_))
        ));
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = cipher().encrypt("JBSWY3DPEHPK3PXP", b"id").unwrap();
        assert!(cipher().decrypt(&sealed, b"id").is_err());
    }

    #[test]
    fn tampered_or_foreign_input_fails() {
        let c = cipher();
        let sealed = c.encrypt("JBSWY3DPEHPK3PXP", b"id").unwrap();

        let mut bytes = STANDARD.decode(&sealed[3..]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = format!("v1:{}", STANDARD.encode(bytes));

        assert!(c.decrypt(&tampered, b"id").is_err());
        assert!(c.decrypt("SkJTV1kzRFBFSFBLM1BYUA==", b"id").is_err());
        assert!(c.decrypt("v1:AAAA", b"id").is_err());
    }

    #[test]
    fn rejects_short_keys() {
        assert!(SecretCipher::from_key_bytes(&[0u8; 16]).is_err());
        assert!(SecretCipher::from_base64_key(&Secret::new("not base64!".to_string())).is_err());
    }
}
