//! Users and their keychains.
//!
//! The key hierarchy hangs off the user: a passphrase-derived symmetric key
//! seals the user's X25519 private key, and that private key opens each
//! keychain item, i.e. the user's sealed copy of one group's private key.
//!
//! `reset_password` is strictly the initialization path: it generates a
//! fresh keypair and therefore empties the keychain (the old sealed group
//! keys can never be opened by the new keypair). Initialized users change
//! their passphrase with `change_password`, which preserves the keychain by
//! re-sealing the already-decrypted group keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kstor_crypto::{
    derive_key, generate_keypair, open_pair, open_secret, seal_pair, seal_secret, ArmoredHidden,
    ArmoredPublicKey, BoxSecretKey, KdfParams, SecretKey,
};

use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    New,
    Active,
    Admin,
    Archived,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::New => "new",
            UserStatus::Active => "active",
            UserStatus::Admin => "admin",
            UserStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(UserStatus::New),
            "active" => Some(UserStatus::Active),
            "admin" => Some(UserStatus::Admin),
            "archived" => Some(UserStatus::Archived),
            _ => None,
        }
    }

    /// Active and admin users may perform ordinary requests.
    pub fn is_operational(&self) -> bool {
        matches!(self, UserStatus::Active | UserStatus::Admin)
    }
}

/// A user's sealed copy of one group's private key.
///
/// Sealed from the group keypair to the user keypair, so opening it both
/// yields the group key and proves it was issued by someone holding it.
#[derive(Debug, Clone)]
pub struct KeychainItem {
    pub group_id: i64,
    pub group_pubk: ArmoredPublicKey,
    pub encrypted_privk: ArmoredHidden,
    /// Plaintext group private key; present only while unlocked.
    pub privk: Option<BoxSecretKey>,
}

impl KeychainItem {
    /// Seal `group_privk` for the holder of `recipient_pubk`.
    pub fn seal_for(
        group_id: i64,
        group_pubk: &ArmoredPublicKey,
        group_privk: &BoxSecretKey,
        recipient_pubk: &ArmoredPublicKey,
    ) -> Result<Self, ModelError> {
        let encrypted_privk =
            seal_pair(recipient_pubk, group_privk, group_privk.to_bytes().as_slice())?;
        Ok(Self {
            group_id,
            group_pubk: group_pubk.clone(),
            encrypted_privk,
            privk: None,
        })
    }

    pub fn unlock(&mut self, user_privk: &BoxSecretKey) -> Result<(), ModelError> {
        if self.privk.is_some() {
            return Ok(());
        }
        let bytes = open_pair(&self.group_pubk, user_privk, &self.encrypted_privk)?;
        self.privk = Some(BoxSecretKey::from_bytes(&bytes)?);
        Ok(())
    }

    /// Re-seal the (unlocked) group private key for `recipient_pubk`.
    pub fn reseal(&mut self, recipient_pubk: &ArmoredPublicKey) -> Result<(), ModelError> {
        let privk = self
            .privk
            .as_ref()
            .ok_or(ModelError::KeychainLocked(self.group_id))?;
        self.encrypted_privk =
            seal_pair(recipient_pubk, privk, privk.to_bytes().as_slice())?;
        Ok(())
    }

    pub fn privk(&self) -> Result<&BoxSecretKey, ModelError> {
        self.privk
            .as_ref()
            .ok_or(ModelError::KeychainLocked(self.group_id))
    }

    pub fn lock(&mut self) {
        self.privk = None;
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub name: String,
    pub status: UserStatus,
    pub kdf_params: Option<KdfParams>,
    pub pubk: Option<ArmoredPublicKey>,
    pub encrypted_privk: Option<ArmoredHidden>,
    /// Plaintext private key; present only while unlocked.
    pub privk: Option<BoxSecretKey>,
    /// group id → sealed group key. Owned by value; groups referenced by id.
    pub keychain: BTreeMap<i64, KeychainItem>,
}

impl User {
    pub fn new(id: i64, login: &str, name: &str, status: UserStatus) -> Self {
        Self {
            id,
            login: login.to_string(),
            name: name.to_string(),
            status,
            kdf_params: None,
            pubk: None,
            encrypted_privk: None,
            privk: None,
            keychain: BTreeMap::new(),
        }
    }

    /// A user can participate in crypto operations only once all three
    /// persisted crypto fields exist.
    pub fn is_initialized(&self) -> bool {
        self.kdf_params.is_some() && self.pubk.is_some() && self.encrypted_privk.is_some()
    }

    pub fn is_unlocked(&self) -> bool {
        self.privk.is_some()
    }

    /// Derive the symmetric key for `password`, initializing the user first
    /// when no crypto data exists yet.
    pub fn secret_key(&mut self, password: &str) -> Result<SecretKey, ModelError> {
        if !self.is_initialized() {
            return self.reset_password(password);
        }
        Ok(derive_key(password, self.kdf_params.clone())?)
    }

    /// Decrypt the private key and every keychain item into memory.
    /// No-op when already unlocked.
    pub fn unlock(&mut self, secret_key: &SecretKey) -> Result<(), ModelError> {
        if self.is_unlocked() {
            return Ok(());
        }
        let encrypted_privk = self
            .encrypted_privk
            .as_ref()
            .ok_or_else(|| ModelError::NotInitialized(self.login.clone()))?;
        let bytes = open_secret(secret_key, encrypted_privk)?;
        let privk = BoxSecretKey::from_bytes(&bytes)?;
        for item in self.keychain.values_mut() {
            item.unlock(&privk)?;
        }
        self.privk = Some(privk);
        Ok(())
    }

    /// Re-seal the (unlocked) private key and keychain under `secret_key`.
    pub fn encrypt(&mut self, secret_key: &SecretKey) -> Result<(), ModelError> {
        let privk = self.privk.as_ref().ok_or(ModelError::Locked)?;
        self.encrypted_privk = Some(seal_secret(secret_key, privk.to_bytes().as_slice())?);
        self.kdf_params = Some(secret_key.params.clone());
        let pubk = self
            .pubk
            .clone()
            .ok_or_else(|| ModelError::NotInitialized(self.login.clone()))?;
        for item in self.keychain.values_mut() {
            item.reseal(&pubk)?;
        }
        Ok(())
    }

    /// Zero all plaintext key material.
    pub fn lock(&mut self) {
        self.privk = None;
        for item in self.keychain.values_mut() {
            item.lock();
        }
    }

    /// Initialization path only: fresh keypair, fresh KDF parameters, empty
    /// keychain. Prior memberships are unrecoverable since their sealed
    /// group keys belonged to the old keypair.
    pub fn reset_password(&mut self, password: &str) -> Result<SecretKey, ModelError> {
        let (pubk, privk) = generate_keypair();
        let secret_key = derive_key(password, None)?;
        self.keychain.clear();
        self.pubk = Some(pubk);
        self.privk = Some(privk);
        self.encrypt(&secret_key)?;
        Ok(secret_key)
    }

    /// Passphrase rotation for an initialized user; the keychain survives
    /// because the group keys are decrypted before re-sealing.
    pub fn change_password(&mut self, old: &str, new: &str) -> Result<SecretKey, ModelError> {
        let old_key = derive_key(old, self.kdf_params.clone())?;
        self.unlock(&old_key)?;
        let new_key = derive_key(new, None)?;
        self.encrypt(&new_key)?;
        Ok(new_key)
    }

    pub fn privk(&self) -> Result<&BoxSecretKey, ModelError> {
        self.privk.as_ref().ok_or(ModelError::Locked)
    }

    pub fn pubk(&self) -> Result<&ArmoredPublicKey, ModelError> {
        self.pubk
            .as_ref()
            .ok_or_else(|| ModelError::NotInitialized(self.login.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kstor_crypto::generate_keypair;

    fn initialized_user(password: &str) -> User {
        let mut user = User::new(1, "alice", "Alice", UserStatus::Admin);
        user.reset_password(password).unwrap();
        user
    }

    fn grant_group(user: &mut User, group_id: i64) -> BoxSecretKey {
        let (group_pubk, group_privk) = generate_keypair();
        let item = KeychainItem::seal_for(group_id, &group_pubk, &group_privk, user.pubk().unwrap())
            .unwrap();
        user.keychain.insert(group_id, item);
        group_privk
    }

    #[test]
    fn reset_then_unlock_yields_same_privk() {
        let mut user = initialized_user("hunter2");
        let reset_pub = user.privk().unwrap().public_key();
        user.lock();
        assert!(!user.is_unlocked());

        let key = user.secret_key("hunter2").unwrap();
        user.unlock(&key).unwrap();
        assert_eq!(user.privk().unwrap().public_key(), reset_pub);
    }

    #[test]
    fn wrong_password_fails_unlock() {
        let mut user = initialized_user("hunter2");
        user.lock();
        let key = user.secret_key("wrong").unwrap();
        assert!(user.unlock(&key).is_err());
    }

    #[test]
    fn unlock_opens_keychain_items() {
        let mut user = initialized_user("hunter2");
        let group_privk = grant_group(&mut user, 7);
        user.lock();

        let key = user.secret_key("hunter2").unwrap();
        user.unlock(&key).unwrap();
        let item = user.keychain.get(&7).unwrap();
        assert_eq!(
            item.privk().unwrap().public_key(),
            group_privk.public_key()
        );
    }

    #[test]
    fn change_password_preserves_keychain() {
        let mut user = initialized_user("oldpw");
        let group_privk = grant_group(&mut user, 3);
        user.lock();

        user.change_password("oldpw", "newpw").unwrap();
        user.lock();

        // Old password no longer works.
        let old_key = user.secret_key("oldpw").unwrap();
        assert!(user.unlock(&old_key).is_err());

        // New password opens the same keychain.
        let new_key = user.secret_key("newpw").unwrap();
        user.unlock(&new_key).unwrap();
        assert_eq!(user.keychain.len(), 1);
        assert_eq!(
            user.keychain.get(&3).unwrap().privk().unwrap().public_key(),
            group_privk.public_key()
        );
    }

    #[test]
    fn reset_password_empties_keychain() {
        let mut user = initialized_user("hunter2");
        grant_group(&mut user, 3);
        assert_eq!(user.keychain.len(), 1);

        user.reset_password("fresh-start").unwrap();
        assert!(user.keychain.is_empty());
    }

    #[test]
    fn lock_clears_all_plaintext_keys() {
        let mut user = initialized_user("hunter2");
        grant_group(&mut user, 3);
        let key = user.secret_key("hunter2").unwrap();
        user.unlock(&key).unwrap();

        user.lock();
        assert!(user.privk.is_none());
        assert!(user.keychain.values().all(|i| i.privk.is_none()));
    }

    #[test]
    fn uninitialized_user_cannot_unlock() {
        let mut user = User::new(2, "bob", "Bob", UserStatus::New);
        assert!(!user.is_initialized());
        let key = derive_key("pw", None).unwrap();
        assert!(matches!(
            user.unlock(&key),
            Err(ModelError::NotInitialized(_))
        ));
    }
}
