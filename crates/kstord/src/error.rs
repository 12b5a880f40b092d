//! Request-level errors.
//!
//! Every error maps 1:1 to a stable wire code and a human-readable message.
//! Handlers raise; the dispatcher turns the error into an `error` response
//! carrying the current session id, so a semantic failure does not cost the
//! client its session.

use thiserror::Error;

use kstor_crypto::CryptoError;
use kstor_model::ModelError;
use kstor_proto::{ParseError, Response};
use kstor_store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("user not allowed to perform this request")]
    Forbidden,

    #[error("invalid session ID {0:?}")]
    BadSession(String),

    #[error("missing login and password")]
    MissingAuth,

    #[error("unknown request type {0:?}")]
    UnknownRequest(String),

    #[error("missing or invalid arguments for {0:?}: {1}")]
    MissingArgs(String, String),

    #[error("unspecified error, see server logs")]
    Unspecified,

    #[error("cryptography library error: {0}")]
    CryptoLib(String),

    #[error("unknown group {0}")]
    UnknownGroup(i64),

    #[error("unknown user {0:?}")]
    UnknownUser(String),

    #[error("group {0} still has other members")]
    GroupHasMembers(i64),

    #[error("user {0:?} holds no private key for group {1}")]
    UnknownGroupPrivk(String, i64),

    #[error("secret {0} not found")]
    SecretNotFound(i64),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("can't open database {0:?}: {1}")]
    CantOpenDatabase(String, String),
}

impl Error {
    /// Stable wire code. Clients match on these, never on messages.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Forbidden => "AUTH/FORBIDDEN",
            Error::BadSession(_) => "AUTH/BADSESSION",
            Error::MissingAuth => "AUTH/MISSING",
            Error::UnknownRequest(_) => "REQ/UNKNOWN",
            Error::MissingArgs(..) => "REQ/MISSINGARGS",
            Error::Unspecified => "CRYPTO/UNSPECIFIED",
            // Historical wire code, kept stable for existing clients.
            Error::CryptoLib(_) => "CRYPTO/RBNACL",
            Error::UnknownGroup(_) => "STORE/UNKNOWNGROUP",
            Error::UnknownUser(_) => "STORE/UNKNOWNUSER",
            Error::GroupHasMembers(_) => "STORE/GROUPHASMEMBERS",
            Error::UnknownGroupPrivk(..) => "STORE/UNKNOWNGROUPPRIVK",
            Error::SecretNotFound(_) => "SECRET/NOTFOUND",
            Error::InvalidMessage(_) => "MSG/INVALID",
            Error::CantOpenDatabase(..) => "SQL/CANTOPEN",
        }
    }

    pub fn to_response(&self) -> Response {
        Response::Error {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Invalid(msg) => Error::InvalidMessage(msg),
            ParseError::UnknownType(kind) => Error::UnknownRequest(kind),
            ParseError::BadArgs(kind, msg) => Error::MissingArgs(kind, msg),
        }
    }
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        Error::CryptoLib(e.to_string())
    }
}

impl From<ModelError> for Error {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Crypto(inner) => Error::CryptoLib(inner.to_string()),
            other => {
                tracing::error!(error = %other, "model error");
                Error::Unspecified
            }
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::CantOpen(path, msg) => Error::CantOpenDatabase(path, msg),
            other => {
                tracing::error!(error = %other, "store error");
                Error::Unspecified
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let cases: [(Error, &str); 8] = [
            (Error::Forbidden, "AUTH/FORBIDDEN"),
            (Error::BadSession("x".into()), "AUTH/BADSESSION"),
            (Error::UnknownRequest("x".into()), "REQ/UNKNOWN"),
            (Error::CryptoLib("x".into()), "CRYPTO/RBNACL"),
            (Error::UnknownGroup(1), "STORE/UNKNOWNGROUP"),
            (Error::SecretNotFound(1), "SECRET/NOTFOUND"),
            (Error::InvalidMessage("x".into()), "MSG/INVALID"),
            (
                Error::CantOpenDatabase("db".into(), "io".into()),
                "SQL/CANTOPEN",
            ),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn error_response_carries_code_and_message() {
        let resp = Error::UnknownGroup(42).to_response();
        match resp {
            Response::Error { code, message } => {
                assert_eq!(code, "STORE/UNKNOWNGROUP");
                assert!(message.contains("42"));
            }
            other => panic!("unexpected response {other:?}"),
        }
    }
}
