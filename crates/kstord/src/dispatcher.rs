//! Request dispatcher.
//!
//! State-free per request: authenticate, route to the controller that
//! declares the request type, run the handler inside one store transaction
//! (commit on success, rollback on error), post-process password changes,
//! and ALWAYS lock the user before the response leaves, error paths
//! included.

use std::sync::Arc;

use tracing::{error, warn};

use kstor_crypto::SecretKey;
use kstor_model::User;
use kstor_proto::{Request, RequestEnvelope, Response, ResponseEnvelope};
use kstor_store::{Store, StoreError};

use crate::controller::{admin, auth, secret, Ctx};
use crate::error::Error;
use crate::session::SessionStore;

pub struct Dispatcher {
    store: Store,
    sessions: Arc<SessionStore>,
}

impl Dispatcher {
    pub fn new(store: Store, sessions: Arc<SessionStore>) -> Self {
        Self { store, sessions }
    }

    /// Handle one raw wire message; never fails, always produces a response.
    pub async fn handle_raw(&self, raw: &[u8]) -> ResponseEnvelope {
        let env = match RequestEnvelope::parse(raw) {
            Ok(env) => env,
            Err(e) => {
                let error: Error = e.into();
                warn!(code = error.code(), "rejected message");
                return ResponseEnvelope {
                    response: error.to_response(),
                    session_id: salvage_session_id(raw),
                };
            }
        };
        self.handle(env).await
    }

    pub async fn handle(&self, env: RequestEnvelope) -> ResponseEnvelope {
        let request_type = env.request.wire_type();

        let (mut user, mut session_id) =
            match auth::authenticate(&self.store, &self.sessions, &env).await {
                Ok(ok) => ok,
                Err(e) => {
                    warn!(request = request_type, code = e.code(), "authentication failed");
                    return ResponseEnvelope {
                        response: e.to_response(),
                        session_id: env
                            .credentials
                            .session_id()
                            .unwrap_or_default()
                            .to_string(),
                    };
                }
            };

        let result = if auth::allowed(&user, &env.request) {
            self.run_handler(&mut user, &env.request).await
        } else {
            Err(Error::Forbidden)
        };

        let response = match result {
            Ok((response, rotated_key)) => {
                if let Some(new_key) = rotated_key {
                    self.sessions.discard(&session_id);
                    session_id = self.sessions.create(user.id, new_key);
                }
                response
            }
            Err(e) => {
                warn!(request = request_type, code = e.code(), "request failed");
                e.to_response()
            }
        };

        // Mandatory: no plaintext key material survives the request.
        user.lock();

        ResponseEnvelope {
            response,
            session_id,
        }
    }

    async fn run_handler(
        &self,
        user: &mut User,
        request: &Request,
    ) -> Result<(Response, Option<SecretKey>), Error> {
        let mut tx = self.store.begin().await?;
        let mut ctx = Ctx::new(&self.store, user);

        let result = match request {
            Request::Ping { payload } => Ok(Response::Pong {
                payload: payload.clone(),
            }),
            Request::SecretCreate { .. }
            | Request::SecretSearch { .. }
            | Request::SecretUnlock { .. }
            | Request::SecretUpdateMeta { .. }
            | Request::SecretUpdateValue { .. }
            | Request::SecretDelete { .. } => secret::handle(&mut tx, &mut ctx, request).await,
            Request::GroupCreate { .. }
            | Request::GroupRename { .. }
            | Request::GroupDelete { .. }
            | Request::GroupSearch { .. }
            | Request::GroupGet { .. }
            | Request::GroupAddUser { .. }
            | Request::GroupRemoveUser { .. }
            | Request::UserCreate { .. }
            | Request::UserActivate { .. }
            | Request::UserChangePassword { .. } => {
                admin::handle(&mut tx, &mut ctx, request).await
            }
        };

        match result {
            Ok(response) => {
                let declared = declared_response_type(request);
                if response.wire_type() != declared {
                    error!(
                        request = request.wire_type(),
                        produced = response.wire_type(),
                        declared,
                        "handler produced an undeclared response type"
                    );
                    return Err(Error::Unspecified);
                }
                let new_secret_key = ctx.new_secret_key.take();
                tx.commit().await.map_err(StoreError::Database)?;
                Ok((response, new_secret_key))
            }
            // Dropping the transaction rolls it back.
            Err(e) => Err(e),
        }
    }
}

/// Each request type declares exactly one success response type.
fn declared_response_type(request: &Request) -> &'static str {
    match request {
        Request::Ping { .. } => "pong",
        Request::GroupCreate { .. } => "group_created",
        Request::GroupRename { .. }
        | Request::GroupAddUser { .. }
        | Request::GroupRemoveUser { .. } => "group_updated",
        Request::GroupDelete { .. } => "group_deleted",
        Request::GroupSearch { .. } => "group_list",
        Request::GroupGet { .. } => "group_info",
        Request::UserCreate { .. } => "user_created",
        Request::UserActivate { .. } => "user_updated",
        Request::UserChangePassword { .. } => "user_password_changed",
        Request::SecretCreate { .. } => "secret_created",
        Request::SecretSearch { .. } => "secret_list",
        Request::SecretUnlock { .. } => "secret_value",
        Request::SecretUpdateMeta { .. } | Request::SecretUpdateValue { .. } => "secret_updated",
        Request::SecretDelete { .. } => "secret_deleted",
    }
}

/// Best-effort recovery of the session id from an unparseable message, so
/// the error response still carries it.
fn salvage_session_id(raw: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| {
            v.get("session_id")
                .and_then(|s| s.as_str())
                .map(String::from)
        })
        .unwrap_or_default()
}
