//! Symmetric encryption for credentials carried in the `auth` parameter.
//!
//! Wire form: `hex(iv) ":" hex(ciphertext)`, lowercase hex, where the IV is
//! 16 random bytes and the ciphertext is AES-256-CBC with PKCS#7 padding over
//! the JSON object `{"username": ..., "password": ...}`. The key is
//! `SHA256(secret)`. The media-source side and the proxy must be configured
//! with the same secret out of band; the wire form carries no key material.

use crate::credential::Credential;
use crate::error::{ProxyError, Result};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// IV length in bytes (one AES block).
const IV_LEN: usize = 16;

/// Plaintext layout. Field order matches what JavaScript producers emit.
#[derive(Serialize, Deserialize)]
struct CredentialPayload {
    username: String,
    password: String,
}

/// Derive the 256-bit key from an arbitrary-length secret.
#[must_use]
pub fn derive_key(secret: &str) -> Zeroizing<[u8; 32]> {
    let digest = Sha256::digest(secret.as_bytes());
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&digest);
    key
}

/// Encrypts and decrypts credential payloads with a shared secret.
#[derive(Clone)]
pub struct CredentialCipher {
    key: Zeroizing<[u8; 32]>,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

impl CredentialCipher {
    /// Create a cipher keyed by `SHA256(secret)`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            key: derive_key(secret),
        }
    }

    /// Encrypt a credential into its wire form.
    ///
    /// Only fails if the OS random source is unavailable.
    pub fn encrypt(&self, credential: &Credential) -> Result<String> {
        let payload = CredentialPayload {
            username: credential.username().to_string(),
            password: credential.password().to_string(),
        };
        let plaintext = Zeroizing::new(
            serde_json::to_vec(&payload).map_err(|e| ProxyError::Cipher(e.to_string()))?,
        );
        drop(payload);

        let mut iv = [0u8; IV_LEN];
        getrandom::fill(&mut iv).map_err(|e| ProxyError::Cipher(format!("RNG failure: {}", e)))?;

        let ciphertext = Aes256CbcEnc::new_from_slices(&self.key[..], &iv)
            .map_err(|e| ProxyError::Cipher(e.to_string()))?
            .encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

        Ok(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)))
    }

    /// Decrypt a wire form back into a credential.
    ///
    /// Returns `None` on any failure: missing separator, bad hex, wrong IV
    /// length, wrong key (bad padding), or a plaintext that is not the
    /// expected JSON object.
    #[must_use]
    pub fn decrypt(&self, wire: &str) -> Option<Credential> {
        let (iv_hex, ciphertext_hex) = wire.split_once(':')?;
        let iv = hex::decode(iv_hex).ok()?;
        if iv.len() != IV_LEN {
            return None;
        }
        let ciphertext = hex::decode(ciphertext_hex).ok()?;

        let plaintext = Zeroizing::new(
            Aes256CbcDec::new_from_slices(&self.key[..], &iv)
                .ok()?
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
                .ok()?,
        );
        let payload: CredentialPayload = serde_json::from_slice(&plaintext).ok()?;
        Some(Credential::new(payload.username, payload.password))
    }
}
