//! Typed wire messages.
//!
//! On the wire a message is one JSON object:
//!
//! ```json
//! { "type": "secret_unlock", "args": { "secret_id": 7 },
//!   "session_id": "..." }
//! ```
//!
//! Requests carry either `login` + `password` or `session_id`; responses
//! always carry `session_id`. The `type` strings are stable; internally a
//! message is a tagged enum variant and dispatch is an exhaustive match.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::meta::SecretMeta;

/// Cap on a single wire message; anything larger is malformed.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

// ── Requests ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "snake_case")]
pub enum Request {
    Ping {
        #[serde(default)]
        payload: String,
    },
    GroupCreate {
        name: String,
    },
    GroupRename {
        group_id: i64,
        name: String,
    },
    GroupDelete {
        group_id: i64,
    },
    GroupSearch {
        name: String,
    },
    GroupGet {
        group_id: i64,
    },
    GroupAddUser {
        group_id: i64,
        user_id: i64,
    },
    GroupRemoveUser {
        group_id: i64,
        user_id: i64,
    },
    UserCreate {
        login: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_lifespan: Option<i64>,
    },
    UserActivate {
        token: String,
    },
    UserChangePassword {
        new_password: String,
    },
    SecretCreate {
        plaintext: String,
        group_ids: Vec<i64>,
        #[serde(default)]
        meta: SecretMeta,
    },
    SecretSearch {
        #[serde(default)]
        meta: SecretMeta,
    },
    SecretUnlock {
        secret_id: i64,
    },
    SecretUpdateMeta {
        secret_id: i64,
        meta: SecretMeta,
    },
    SecretUpdateValue {
        secret_id: i64,
        plaintext: String,
    },
    SecretDelete {
        secret_id: i64,
    },
}

const REQUEST_TYPES: &[&str] = &[
    "ping",
    "group_create",
    "group_rename",
    "group_delete",
    "group_search",
    "group_get",
    "group_add_user",
    "group_remove_user",
    "user_create",
    "user_activate",
    "user_change_password",
    "secret_create",
    "secret_search",
    "secret_unlock",
    "secret_update_meta",
    "secret_update_value",
    "secret_delete",
];

impl Request {
    /// Stable on-the-wire type string.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Request::Ping { .. } => "ping",
            Request::GroupCreate { .. } => "group_create",
            Request::GroupRename { .. } => "group_rename",
            Request::GroupDelete { .. } => "group_delete",
            Request::GroupSearch { .. } => "group_search",
            Request::GroupGet { .. } => "group_get",
            Request::GroupAddUser { .. } => "group_add_user",
            Request::GroupRemoveUser { .. } => "group_remove_user",
            Request::UserCreate { .. } => "user_create",
            Request::UserActivate { .. } => "user_activate",
            Request::UserChangePassword { .. } => "user_change_password",
            Request::SecretCreate { .. } => "secret_create",
            Request::SecretSearch { .. } => "secret_search",
            Request::SecretUnlock { .. } => "secret_unlock",
            Request::SecretUpdateMeta { .. } => "secret_update_meta",
            Request::SecretUpdateValue { .. } => "secret_update_value",
            Request::SecretDelete { .. } => "secret_delete",
        }
    }
}

// ── Responses ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: i64,
    pub login: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretSummary {
    pub secret_id: i64,
    pub group_id: i64,
    pub metadata: SecretMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "snake_case")]
pub enum Response {
    Pong {
        payload: String,
    },
    GroupCreated {
        group_id: i64,
        name: String,
    },
    GroupUpdated {
        group_id: i64,
    },
    GroupDeleted {
        group_id: i64,
    },
    GroupList {
        groups: Vec<GroupSummary>,
    },
    GroupInfo {
        group: GroupSummary,
        members: Vec<UserSummary>,
    },
    UserCreated {
        user: UserSummary,
        token: String,
        not_after: i64,
    },
    UserUpdated {
        user_id: i64,
    },
    UserPasswordChanged {
        user_id: i64,
    },
    SecretCreated {
        secret_id: i64,
    },
    SecretList {
        secrets: Vec<SecretSummary>,
    },
    SecretValue {
        secret_id: i64,
        plaintext: String,
        metadata: SecretMeta,
        value_author: UserSummary,
        meta_author: UserSummary,
        groups: Vec<GroupSummary>,
    },
    SecretUpdated {
        secret_id: i64,
    },
    SecretDeleted {
        secret_id: i64,
    },
    Error {
        code: String,
        message: String,
    },
}

impl Response {
    pub fn wire_type(&self) -> &'static str {
        match self {
            Response::Pong { .. } => "pong",
            Response::GroupCreated { .. } => "group_created",
            Response::GroupUpdated { .. } => "group_updated",
            Response::GroupDeleted { .. } => "group_deleted",
            Response::GroupList { .. } => "group_list",
            Response::GroupInfo { .. } => "group_info",
            Response::UserCreated { .. } => "user_created",
            Response::UserUpdated { .. } => "user_updated",
            Response::UserPasswordChanged { .. } => "user_password_changed",
            Response::SecretCreated { .. } => "secret_created",
            Response::SecretList { .. } => "secret_list",
            Response::SecretValue { .. } => "secret_value",
            Response::SecretUpdated { .. } => "secret_updated",
            Response::SecretDeleted { .. } => "secret_deleted",
            Response::Error { .. } => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

// ── Envelopes ────────────────────────────────────────────────────────────────

/// How the client authenticated this request.
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    Login { login: String, password: String },
    Session { session_id: String },
}

impl Credentials {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Credentials::Session { session_id } => Some(session_id),
            Credentials::Login { .. } => None,
        }
    }
}

/// A parsed inbound request: typed body + authentication material.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub credentials: Credentials,
    pub request: Request,
}

#[derive(Debug, Error)]
pub enum ParseError {
    /// The message is not a valid request envelope (`MSG/INVALID`).
    #[error("invalid message: {0}")]
    Invalid(String),

    /// The `type` string names no known request (`REQ/UNKNOWN`).
    #[error("unknown request type {0:?}")]
    UnknownType(String),

    /// The `type` is known but `args` misses required fields
    /// (`REQ/MISSINGARGS`).
    #[error("bad arguments for {0:?}: {1}")]
    BadArgs(String, String),
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    args: serde_json::Value,
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

impl RequestEnvelope {
    pub fn new(credentials: Credentials, request: Request) -> Self {
        Self {
            credentials,
            request,
        }
    }

    /// Parse one wire message. Distinguishes malformed envelopes, unknown
    /// request types, and known types with missing arguments, because each
    /// maps to a different stable error code.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() > MAX_MESSAGE_BYTES {
            return Err(ParseError::Invalid("message too large".into()));
        }
        let raw: RawMessage = serde_json::from_slice(bytes)
            .map_err(|e| ParseError::Invalid(e.to_string()))?;

        let credentials = match (raw.login, raw.password, raw.session_id) {
            (Some(login), Some(password), _) => Credentials::Login { login, password },
            (None, None, Some(session_id)) => Credentials::Session { session_id },
            _ => {
                return Err(ParseError::Invalid(
                    "message carries neither login+password nor session_id".into(),
                ))
            }
        };

        if !REQUEST_TYPES.contains(&raw.kind.as_str()) {
            return Err(ParseError::UnknownType(raw.kind));
        }

        let args = match raw.args {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other,
        };
        let tagged = serde_json::json!({ "type": raw.kind, "args": args });
        let request: Request = serde_json::from_value(tagged)
            .map_err(|e| ParseError::BadArgs(raw.kind, e.to_string()))?;

        Ok(Self {
            credentials,
            request,
        })
    }

    /// Serialize to the wire form (client side; also used by tests).
    pub fn to_value(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(&self.request)
            .expect("requests always serialize");
        let map = value.as_object_mut().expect("tagged enum is an object");
        match &self.credentials {
            Credentials::Login { login, password } => {
                map.insert("login".into(), serde_json::Value::String(login.clone()));
                map.insert(
                    "password".into(),
                    serde_json::Value::String(password.clone()),
                );
            }
            Credentials::Session { session_id } => {
                map.insert(
                    "session_id".into(),
                    serde_json::Value::String(session_id.clone()),
                );
            }
        }
        value
    }
}

/// Outbound response + the (possibly rotated) session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(flatten)]
    pub response: Response,
    pub session_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_login_request() {
        let raw = br#"{"type":"ping","args":{"payload":"x"},"login":"alice","password":"hunter2"}"#;
        let env = RequestEnvelope::parse(raw).unwrap();
        assert_eq!(
            env.request,
            Request::Ping {
                payload: "x".into()
            }
        );
        assert!(matches!(env.credentials, Credentials::Login { .. }));
    }

    #[test]
    fn parse_session_request() {
        let raw = br#"{"type":"secret_unlock","args":{"secret_id":7},"session_id":"abc"}"#;
        let env = RequestEnvelope::parse(raw).unwrap();
        assert_eq!(env.request, Request::SecretUnlock { secret_id: 7 });
        assert_eq!(env.credentials.session_id(), Some("abc"));
    }

    #[test]
    fn missing_credentials_is_invalid() {
        let raw = br#"{"type":"ping","args":{}}"#;
        assert!(matches!(
            RequestEnvelope::parse(raw),
            Err(ParseError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_type_is_distinguished() {
        let raw = br#"{"type":"frobnicate","args":{},"session_id":"abc"}"#;
        assert!(matches!(
            RequestEnvelope::parse(raw),
            Err(ParseError::UnknownType(t)) if t == "frobnicate"
        ));
    }

    #[test]
    fn known_type_with_missing_args() {
        let raw = br#"{"type":"secret_unlock","args":{},"session_id":"abc"}"#;
        assert!(matches!(
            RequestEnvelope::parse(raw),
            Err(ParseError::BadArgs(t, _)) if t == "secret_unlock"
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            RequestEnvelope::parse(b"not json"),
            Err(ParseError::Invalid(_))
        ));
    }

    #[test]
    fn envelope_roundtrip_is_stable() {
        let env = RequestEnvelope::new(
            Credentials::Session {
                session_id: "s".into(),
            },
            Request::SecretCreate {
                plaintext: "p@ss".into(),
                group_ids: vec![1, 2],
                meta: SecretMeta {
                    app: Some("db".into()),
                    ..SecretMeta::default()
                },
            },
        );
        let bytes = serde_json::to_vec(&env.to_value()).unwrap();
        let back = RequestEnvelope::parse(&bytes).unwrap();
        assert_eq!(back, env);
        // serialize → parse → serialize is byte-identical after normalization
        let again = serde_json::to_vec(&back.to_value()).unwrap();
        assert_eq!(bytes, again);
    }

    #[test]
    fn response_envelope_carries_session_and_type() {
        let env = ResponseEnvelope {
            response: Response::Pong {
                payload: "x".into(),
            },
            session_id: "sid".into(),
        };
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["type"], "pong");
        assert_eq!(v["args"]["payload"], "x");
        assert_eq!(v["session_id"], "sid");
        let back: ResponseEnvelope = serde_json::from_value(v).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn error_response_shape() {
        let env = ResponseEnvelope {
            response: Response::Error {
                code: "AUTH/BADSESSION".into(),
                message: "invalid session ID \"x\"".into(),
            },
            session_id: String::new(),
        };
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["type"], "error");
        assert_eq!(v["args"]["code"], "AUTH/BADSESSION");
    }
}
