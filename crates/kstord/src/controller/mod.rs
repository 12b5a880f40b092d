//! Request controllers.
//!
//! Each controller receives the authenticated, unlocked user and the open
//! transaction connection. Controllers raise `Error`; the dispatcher owns
//! commit/rollback and the mandatory post-request lock.

pub mod admin;
pub mod auth;
pub mod secret;

use kstor_crypto::SecretKey;
use kstor_model::{Group, User};
use kstor_proto::{GroupSummary, UserSummary};
use kstor_store::Store;

/// Per-request handler context.
pub struct Ctx<'a> {
    pub store: &'a Store,
    pub user: &'a mut User,
    /// Set when the handler rotated the user's passphrase; the dispatcher
    /// then discards the old session and issues a fresh one.
    pub new_secret_key: Option<SecretKey>,
}

impl<'a> Ctx<'a> {
    pub fn new(store: &'a Store, user: &'a mut User) -> Self {
        Self {
            store,
            user,
            new_secret_key: None,
        }
    }
}

pub(crate) fn user_summary(user: &User) -> UserSummary {
    UserSummary {
        user_id: user.id,
        login: user.login.clone(),
        name: user.name.clone(),
        status: user.status.as_str().to_string(),
    }
}

pub(crate) fn group_summary(group: &Group) -> GroupSummary {
    GroupSummary {
        group_id: group.id,
        name: group.name.clone(),
    }
}
