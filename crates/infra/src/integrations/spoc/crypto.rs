//! AES envelope for the second portal's query protocol
//!
//! The portal wraps every RPC payload as Base64(AES-128-CBC(PKCS#7,
//! compact-JSON)) under a fixed key/IV pair shared with its frontend.
//! Decryption tolerates bad padding — some responses arrive space-padded
//! instead of PKCS#7 — by falling back to the raw decrypted bytes, and an
//! empty payload decodes to an empty object.

use aes::Aes128;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use campline_domain::{CamplineError, Result};
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use serde_json::Value;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

const BLOCK: usize = 16;

/// Symmetric envelope codec with a fixed key and IV.
#[derive(Clone)]
pub struct EnvelopeCipher {
    key: [u8; 16],
    iv: [u8; 16],
}

impl EnvelopeCipher {
    pub fn new(key: [u8; 16], iv: [u8; 16]) -> Self {
        Self { key, iv }
    }

    /// Serialize `value` without extra whitespace, encrypt and Base64-encode.
    pub fn encrypt_value(&self, value: &Value) -> Result<String> {
        let plain = serde_json::to_string(value)
            .map_err(|err| CamplineError::Internal(format!("serializing payload: {err}")))?;

        let ciphertext = Aes128CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plain.as_bytes());

        Ok(BASE64.encode(ciphertext))
    }

    /// Base64-decode, decrypt, unpad and JSON-parse a payload.
    pub fn decrypt_value(&self, payload: &str) -> Result<Value> {
        if payload.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        let ciphertext = BASE64
            .decode(payload)
            .map_err(|err| CamplineError::Data(format!("payload is not Base64: {err}")))?;

        if ciphertext.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        if ciphertext.len() % BLOCK != 0 {
            return Err(CamplineError::Data(format!(
                "ciphertext length {} is not a block multiple",
                ciphertext.len()
            )));
        }

        let raw = Aes128CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<NoPadding>(&ciphertext)
            .map_err(|_| CamplineError::Data("AES decryption failed".into()))?;

        let plaintext = strip_pkcs7(&raw).unwrap_or(&raw[..]);

        serde_json::from_slice(plaintext)
            .map_err(|err| CamplineError::Data(format!("decrypted payload is not JSON: {err}")))
    }
}

/// Remove a valid PKCS#7 suffix, or `None` when the padding is malformed.
fn strip_pkcs7(raw: &[u8]) -> Option<&[u8]> {
    let pad = *raw.last()? as usize;
    if pad == 0 || pad > BLOCK || pad > raw.len() {
        return None;
    }
    raw[raw.len() - pad..]
        .iter()
        .all(|&byte| byte as usize == pad)
        .then(|| &raw[..raw.len() - pad])
}
