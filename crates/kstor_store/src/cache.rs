//! Process-wide cache of users and groups.
//!
//! Shared across workers behind read-write locks; invalidated by key on any
//! write touching the entity. Users are cached in their locked form only;
//! plaintext key material never lives here.

use std::collections::HashMap;

use parking_lot::RwLock;

use kstor_model::{Group, User};

#[derive(Default)]
pub struct EntityCache {
    users: RwLock<HashMap<i64, User>>,
    logins: RwLock<HashMap<String, i64>>,
    groups: RwLock<HashMap<i64, Group>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_user(&self, id: i64) -> Option<User> {
        self.users.read().get(&id).cloned()
    }

    pub fn get_user_by_login(&self, login: &str) -> Option<User> {
        let id = *self.logins.read().get(login)?;
        self.get_user(id)
    }

    pub fn put_user(&self, user: &User) {
        let mut cached = user.clone();
        cached.lock();
        self.logins.write().insert(cached.login.clone(), cached.id);
        self.users.write().insert(cached.id, cached);
    }

    pub fn invalidate_user(&self, id: i64) {
        self.users.write().remove(&id);
        self.logins.write().retain(|_, v| *v != id);
    }

    pub fn get_group(&self, id: i64) -> Option<Group> {
        self.groups.read().get(&id).cloned()
    }

    pub fn put_group(&self, group: &Group) {
        self.groups.write().insert(group.id, group.clone());
    }

    pub fn invalidate_group(&self, id: i64) {
        self.groups.write().remove(&id);
    }
}
