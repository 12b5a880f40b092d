use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Crypto(#[from] kstor_crypto::CryptoError),

    #[error("user {0:?} has no crypto data yet")]
    NotInitialized(String),

    #[error("operation requires an unlocked user")]
    Locked,

    #[error("keychain item for group {0} is locked")]
    KeychainLocked(i64),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}
