//! ASCII armor — base64url (no padding) envelope around binary blobs.
//!
//! Everything KStor stores or puts on the wire is armored: ciphertext,
//! public keys, KDF parameters. The armored form is an opaque ASCII
//! string; `armor` / `unarmor` round-trip arbitrary byte strings.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Encode raw bytes into their ASCII-safe armored form.
pub fn armor(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode an armored string back into raw bytes.
pub fn unarmor(s: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(URL_SAFE_NO_PAD.decode(s)?)
}

// ── Armored newtypes ─────────────────────────────────────────────────────────

/// Armored ciphertext (output of `seal_secret` / `seal_pair`).
/// Opaque to everyone without the matching key; safe to store and log ids of,
/// never decrypted outside a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArmoredHidden(Vec<u8>);

impl ArmoredHidden {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_armored(&self) -> String {
        armor(&self.0)
    }

    pub fn from_armored(s: &str) -> Result<Self, CryptoError> {
        Ok(Self(unarmor(s)?))
    }
}

impl TryFrom<String> for ArmoredHidden {
    type Error = CryptoError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_armored(&s)
    }
}

impl From<ArmoredHidden> for String {
    fn from(v: ArmoredHidden) -> String {
        v.to_armored()
    }
}

/// 32-byte X25519 public key, armored on the wire and in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArmoredPublicKey(Vec<u8>);

impl ArmoredPublicKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::BadKey(format!(
                "public key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_armored(&self) -> String {
        armor(&self.0)
    }

    pub fn from_armored(s: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(unarmor(s)?)
    }

    pub(crate) fn to_box_key(&self) -> Result<crypto_box::PublicKey, CryptoError> {
        let arr: [u8; 32] = self
            .0
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::BadKey("public key not 32 bytes".into()))?;
        Ok(crypto_box::PublicKey::from(arr))
    }
}

impl TryFrom<String> for ArmoredPublicKey {
    type Error = CryptoError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_armored(&s)
    }
}

impl From<ArmoredPublicKey> for String {
    fn from(v: ArmoredPublicKey) -> String {
        v.to_armored()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn armor_roundtrip_arbitrary_bytes() {
        let cases: [&[u8]; 4] = [
            b"",
            b"hello",
            &[0x00, 0xff, 0xfe, 0x80, 0x01],
            &[0xf0, 0x9f, 0x92, 0x80, 0x00, 0xc3, 0x28], // invalid UTF-8
        ];
        for bytes in cases {
            let armored = armor(bytes);
            assert!(armored.is_ascii());
            assert_eq!(unarmor(&armored).unwrap(), bytes);
        }
    }

    #[test]
    fn hidden_serde_is_a_plain_string() {
        let h = ArmoredHidden::from_bytes(vec![1, 2, 3]);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h.to_armored()));
        let back: ArmoredHidden = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn public_key_rejects_bad_length() {
        assert!(ArmoredPublicKey::from_bytes(vec![0u8; 31]).is_err());
        assert!(ArmoredPublicKey::from_bytes(vec![0u8; 32]).is_ok());
    }
}
