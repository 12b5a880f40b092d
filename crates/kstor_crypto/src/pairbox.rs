//! Public-key authenticated encryption — X25519 + XChaCha20-Poly1305 box.
//!
//! `seal_pair(recipient_pubk, sender_privk, bytes)` produces a ciphertext
//! only the recipient can open, and opening with `open_pair(sender_pubk,
//! recipient_privk, ct)` cryptographically verifies the sender. Same
//! envelope convention as the symmetric box:
//!   [ nonce (24 bytes) | ciphertext + tag ]

use crypto_box::{aead::Aead, ChaChaBox};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::armor::{ArmoredHidden, ArmoredPublicKey};
use crate::error::CryptoError;

const NONCE_BYTES: usize = 24;

/// X25519 private key half of a box keypair. Zeroized on drop by the
/// underlying type.
#[derive(Clone)]
pub struct BoxSecretKey(crypto_box::SecretKey);

impl BoxSecretKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::BadKey("private key must be 32 bytes".into()))?;
        Ok(Self(crypto_box::SecretKey::from(arr)))
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.to_bytes())
    }

    pub fn public_key(&self) -> ArmoredPublicKey {
        ArmoredPublicKey::from_bytes(self.0.public_key().as_bytes().to_vec())
            .expect("x25519 public keys are 32 bytes")
    }
}

impl std::fmt::Debug for BoxSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BoxSecretKey(<redacted>)")
    }
}

/// Generate a fresh X25519 keypair.
pub fn generate_keypair() -> (ArmoredPublicKey, BoxSecretKey) {
    let secret = crypto_box::SecretKey::generate(&mut rand::rngs::OsRng);
    let secret = BoxSecretKey(secret);
    (secret.public_key(), secret)
}

/// Seal `plaintext` from `sender` to `recipient`.
pub fn seal_pair(
    recipient: &ArmoredPublicKey,
    sender: &BoxSecretKey,
    plaintext: &[u8],
) -> Result<ArmoredHidden, CryptoError> {
    let msg_box = ChaChaBox::new(&recipient.to_box_key()?, &sender.0);
    let mut nonce_bytes = [0u8; NONCE_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = crypto_box::Nonce::from(nonce_bytes);
    let ciphertext = msg_box
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::Encrypt)?;

    let mut out = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(ArmoredHidden::from_bytes(out))
}

/// Open a `seal_pair` envelope, verifying it was sealed by `sender`.
pub fn open_pair(
    sender: &ArmoredPublicKey,
    recipient: &BoxSecretKey,
    hidden: &ArmoredHidden,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let data = hidden.as_bytes();
    if data.len() < NONCE_BYTES {
        return Err(CryptoError::Decrypt);
    }
    let (nonce_bytes, ct) = data.split_at(NONCE_BYTES);
    let msg_box = ChaChaBox::new(&sender.to_box_key()?, &recipient.0);
    let plaintext = msg_box
        .decrypt(nonce_bytes.into(), ct)
        .map_err(|_| CryptoError::Decrypt)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_between_two_keypairs() {
        let (alice_pub, alice_sec) = generate_keypair();
        let (bob_pub, bob_sec) = generate_keypair();

        let sealed = seal_pair(&bob_pub, &alice_sec, b"p@ss").unwrap();
        let opened = open_pair(&alice_pub, &bob_sec, &sealed).unwrap();
        assert_eq!(opened.as_slice(), b"p@ss");
    }

    #[test]
    fn open_verifies_sender() {
        let (_alice_pub, alice_sec) = generate_keypair();
        let (bob_pub, bob_sec) = generate_keypair();
        let (mallory_pub, _mallory_sec) = generate_keypair();

        let sealed = seal_pair(&bob_pub, &alice_sec, b"p@ss").unwrap();
        // Claiming the message came from mallory must fail authentication.
        assert!(open_pair(&mallory_pub, &bob_sec, &sealed).is_err());
    }

    #[test]
    fn wrong_recipient_cannot_open() {
        let (alice_pub, alice_sec) = generate_keypair();
        let (bob_pub, _bob_sec) = generate_keypair();
        let (_eve_pub, eve_sec) = generate_keypair();

        let sealed = seal_pair(&bob_pub, &alice_sec, b"p@ss").unwrap();
        assert!(open_pair(&alice_pub, &eve_sec, &sealed).is_err());
    }

    #[test]
    fn secret_key_byte_roundtrip() {
        let (_pubk, sec) = generate_keypair();
        let restored = BoxSecretKey::from_bytes(sec.to_bytes().as_slice()).unwrap();
        assert_eq!(restored.public_key(), sec.public_key());
    }
}
