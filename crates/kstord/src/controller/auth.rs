//! Authentication.
//!
//! Resolves a request to an unlocked `User` plus a session id. Three paths:
//!
//! 1. Empty store: the request must carry login+password; the first user
//!    ever created becomes admin.
//! 2. `user_activate`: login+password required (a session id is not
//!    enough); the user must be `new` and present a valid activation token.
//! 3. Anything else: a live session re-unlocks with the cached key, or a
//!    password login derives the key and opens a fresh session.

use sqlx::SqliteConnection;
use tracing::{debug, info};

use kstor_crypto::{derive_key, params_obsolete};
use kstor_model::activation::epoch_now;
use kstor_model::{User, UserStatus};
use kstor_proto::{Credentials, Request, RequestEnvelope};
use kstor_store::Store;

use crate::error::Error;
use crate::session::SessionStore;

pub async fn authenticate(
    store: &Store,
    sessions: &SessionStore,
    env: &RequestEnvelope,
) -> Result<(User, String), Error> {
    let mut conn = store.acquire().await?;

    if store.user_count(&mut conn).await? == 0 {
        return bootstrap_first_user(store, sessions, &mut conn, env).await;
    }
    if let Request::UserActivate { token } = &env.request {
        return activate_user(store, sessions, &mut conn, env, token).await;
    }

    match &env.credentials {
        Credentials::Session { session_id } => {
            let (user_id, secret_key) = sessions
                .fetch(session_id)
                .ok_or_else(|| Error::BadSession(session_id.clone()))?;
            let mut user = store
                .user_by_id(&mut conn, user_id)
                .await?
                .ok_or_else(|| Error::BadSession(session_id.clone()))?;
            user.unlock(&secret_key)?;
            Ok((user, session_id.clone()))
        }
        Credentials::Login { login, password } => {
            let mut user = store
                .user_by_login(&mut conn, login)
                .await?
                .ok_or_else(|| Error::UnknownUser(login.clone()))?;
            let mut secret_key = user.secret_key(password)?;
            user.unlock(&secret_key)?;

            if user.kdf_params.as_ref().is_some_and(params_obsolete) {
                debug!(login, "KDF parameters are obsolete; re-deriving");
                secret_key = derive_key(password, None)?;
                user.encrypt(&secret_key)?;
                store.save_user_crypto(&mut conn, &user).await?;
                store.save_user_keychain(&mut conn, &user).await?;
            }

            let session_id = sessions.create(user.id, secret_key);
            Ok((user, session_id))
        }
    }
}

/// The authorization predicate: who may run which request at all.
pub fn allowed(user: &User, request: &Request) -> bool {
    user.status.is_operational()
        || (user.status == UserStatus::New && matches!(request, Request::UserActivate { .. }))
}

async fn bootstrap_first_user(
    store: &Store,
    sessions: &SessionStore,
    conn: &mut SqliteConnection,
    env: &RequestEnvelope,
) -> Result<(User, String), Error> {
    let Credentials::Login { login, password } = &env.credentials else {
        return Err(Error::MissingAuth);
    };
    info!(login, "store is empty; creating first user as admin");

    let user_id = store
        .create_user(conn, login, login, UserStatus::Admin)
        .await?;
    let mut user = User::new(user_id, login, login, UserStatus::Admin);
    let secret_key = user.secret_key(password)?;
    user.unlock(&secret_key)?;
    store.save_user_crypto(conn, &user).await?;

    let session_id = sessions.create(user.id, secret_key);
    Ok((user, session_id))
}

async fn activate_user(
    store: &Store,
    sessions: &SessionStore,
    conn: &mut SqliteConnection,
    env: &RequestEnvelope,
    token: &str,
) -> Result<(User, String), Error> {
    let Credentials::Login { login, password } = &env.credentials else {
        return Err(Error::MissingAuth);
    };
    let mut user = store
        .user_by_login(conn, login)
        .await?
        .ok_or_else(|| Error::UnknownUser(login.clone()))?;
    if user.status != UserStatus::New {
        return Err(Error::Forbidden);
    }
    let now = epoch_now();
    let tokens = store.activations_for_user(conn, user.id).await?;
    if !tokens.iter().any(|t| t.token == token && t.valid_at(now)) {
        return Err(Error::Forbidden);
    }

    // First passphrase: generates the keypair and seals it.
    let secret_key = user.secret_key(password)?;
    user.unlock(&secret_key)?;
    store.save_user_crypto(conn, &user).await?;
    store.set_user_status(conn, user.id, UserStatus::Active).await?;
    user.status = UserStatus::Active;
    store.purge_activations(conn, user.id).await?;
    info!(login, "user activated");

    let session_id = sessions.create(user.id, secret_key);
    Ok((user, session_id))
}
