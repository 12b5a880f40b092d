use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    Kdf(String),

    #[error("Encryption failed")]
    Encrypt,

    #[error("Decryption failed (authentication tag mismatch: wrong key or tampering)")]
    Decrypt,

    #[error("Invalid key material: {0}")]
    BadKey(String),

    #[error("Armor decode error: {0}")]
    Armor(#[from] base64::DecodeError),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}
