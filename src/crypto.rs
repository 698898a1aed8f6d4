//! Reversible encryption of email addresses for verification and reset links.
//!
//! Output layout is `base64url(nonce[12] || ciphertext || tag[16])` without padding,
//! so the value can sit in a URL path segment as is.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use anyhow::Context;
use base64::engine::{
    general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use rand::Rng;

use crate::error::{AuthError, AuthResult};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Clone)]
pub struct EmailCipher {
    cipher: Aes256Gcm,
}

impl EmailCipher {
    /// Build from a base64 (standard alphabet) encoded 32 byte key.
    pub fn from_base64_key(key_b64: &str) -> anyhow::Result<Self> {
        let key_bytes = STANDARD
            .decode(key_b64.trim())
            .context("decode EMAIL_CIPHER_KEY")?;
        anyhow::ensure!(
            key_bytes.len() == 32,
            "EMAIL_CIPHER_KEY must be 32 bytes, got {}",
            key_bytes.len()
        );
        Ok(Self::from_key(&key_bytes))
    }

    fn from_key(key: &[u8]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn encrypt(&self, email: &str) -> AuthResult<String> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::thread_rng().gen();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), email.as_bytes())
            .map_err(|e| anyhow::anyhow!("aes-gcm encrypt: {}", e))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Any malformed, truncated or tampered value yields [`AuthError::Decryption`].
    pub fn decrypt(&self, value: &str) -> AuthResult<String> {
        let raw = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| AuthError::Decryption)?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(AuthError::Decryption);
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AuthError::Decryption)?;
        String::from_utf8(plain).map_err(|_| AuthError::Decryption)
    }
}

#[cfg(test)]
pub(crate) fn test_cipher() -> EmailCipher {
    EmailCipher::from_key(&[7u8; 32])
}
