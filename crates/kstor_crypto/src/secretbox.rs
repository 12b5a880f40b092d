//! Symmetric authenticated encryption — XChaCha20-Poly1305.
//!
//! Key size: 32 bytes. Nonce: 24 bytes (random, fresh per call). Tag: 16 bytes.
//!
//! Ciphertext envelope:
//!   [ nonce (24 bytes) | ciphertext + tag ]

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng},
    XChaCha20Poly1305,
};
use zeroize::Zeroizing;

use crate::armor::ArmoredHidden;
use crate::error::CryptoError;
use crate::kdf::SecretKey;

const NONCE_BYTES: usize = 24;

/// Seal `plaintext` under a passphrase-derived key, bundling a fresh random
/// nonce inside the armored envelope.
pub fn seal_secret(key: &SecretKey, plaintext: &[u8]) -> Result<ArmoredHidden, CryptoError> {
    let cipher =
        XChaCha20Poly1305::new_from_slice(key.bytes()).map_err(|_| CryptoError::Encrypt)?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::Encrypt)?;

    let mut out = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(ArmoredHidden::from_bytes(out))
}

/// Open a `seal_secret` envelope. Fails on wrong key or tampering.
pub fn open_secret(
    key: &SecretKey,
    hidden: &ArmoredHidden,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let data = hidden.as_bytes();
    if data.len() < NONCE_BYTES {
        return Err(CryptoError::Decrypt);
    }
    let (nonce_bytes, ct) = data.split_at(NONCE_BYTES);
    let nonce = chacha20poly1305::XNonce::from_slice(nonce_bytes);
    let cipher =
        XChaCha20Poly1305::new_from_slice(key.bytes()).map_err(|_| CryptoError::Decrypt)?;
    let plaintext = cipher.decrypt(nonce, ct).map_err(|_| CryptoError::Decrypt)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_key;

    #[test]
    fn seal_open_roundtrip() {
        let key = derive_key("correct horse", None).unwrap();
        let sealed = seal_secret(&key, b"battery staple").unwrap();
        let opened = open_secret(&key, &sealed).unwrap();
        assert_eq!(opened.as_slice(), b"battery staple");
    }

    #[test]
    fn fresh_nonce_per_call() {
        let key = derive_key("correct horse", None).unwrap();
        let a = seal_secret(&key, b"same input").unwrap();
        let b = seal_secret(&key, b"same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let key = derive_key("correct horse", None).unwrap();
        let other = derive_key("wrong horse", None).unwrap();
        let sealed = seal_secret(&key, b"battery staple").unwrap();
        assert!(open_secret(&other, &sealed).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = derive_key("correct horse", None).unwrap();
        let sealed = seal_secret(&key, b"battery staple").unwrap();
        let mut bytes = sealed.as_bytes().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = ArmoredHidden::from_bytes(bytes);
        assert!(open_secret(&key, &tampered).is_err());
    }
}
