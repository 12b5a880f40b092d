use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("can't open database {0}: {1}")]
    CantOpen(String, String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<kstor_crypto::CryptoError> for StoreError {
    fn from(e: kstor_crypto::CryptoError) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}
