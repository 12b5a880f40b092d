//! Database row models — these map to/from SQL rows, then convert into the
//! domain types with armored fields decoded.

use kstor_crypto::{ArmoredHidden, ArmoredPublicKey, KdfParams};
use kstor_model::{ActivationToken, Group, KeychainItem, Secret, User, UserStatus};

use crate::error::StoreError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub login: String,
    pub name: String,
    pub status: String,
    pub kdf_params: Option<String>,
    pub pubk: Option<String>,
    pub encrypted_privk: Option<String>,
}

impl UserRow {
    pub fn into_user(self) -> Result<User, StoreError> {
        let status = UserStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown user status {:?}", self.status)))?;
        let mut user = User::new(self.id, &self.login, &self.name, status);
        user.kdf_params = self
            .kdf_params
            .as_deref()
            .map(KdfParams::from_armored)
            .transpose()?;
        user.pubk = self
            .pubk
            .as_deref()
            .map(ArmoredPublicKey::from_armored)
            .transpose()?;
        user.encrypted_privk = self
            .encrypted_privk
            .as_deref()
            .map(ArmoredHidden::from_armored)
            .transpose()?;
        Ok(user)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeychainRow {
    pub group_id: i64,
    pub group_pubk: String,
    pub encrypted_privk: String,
}

impl KeychainRow {
    pub fn into_item(self) -> Result<KeychainItem, StoreError> {
        Ok(KeychainItem {
            group_id: self.group_id,
            group_pubk: ArmoredPublicKey::from_armored(&self.group_pubk)?,
            encrypted_privk: ArmoredHidden::from_armored(&self.encrypted_privk)?,
            privk: None,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupRow {
    pub id: i64,
    pub name: String,
    pub pubk: String,
}

impl GroupRow {
    pub fn into_group(self) -> Result<Group, StoreError> {
        Ok(Group {
            id: self.id,
            name: self.name,
            pubk: ArmoredPublicKey::from_armored(&self.pubk)?,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SecretRow {
    pub id: i64,
    pub group_id: i64,
    pub value_author_id: i64,
    pub meta_author_id: i64,
    pub ciphertext: String,
    pub encrypted_metadata: String,
}

impl SecretRow {
    pub fn into_secret(self) -> Result<Secret, StoreError> {
        Ok(Secret {
            id: self.id,
            group_id: self.group_id,
            value_author_id: self.value_author_id,
            meta_author_id: self.meta_author_id,
            ciphertext: ArmoredHidden::from_armored(&self.ciphertext)?,
            encrypted_metadata: ArmoredHidden::from_armored(&self.encrypted_metadata)?,
            plaintext: None,
            metadata: None,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivationRow {
    pub user_id: i64,
    pub token: String,
    pub not_before: i64,
    pub not_after: i64,
}

impl ActivationRow {
    pub fn into_token(self) -> ActivationToken {
        ActivationToken {
            user_id: self.user_id,
            token: self.token,
            not_before: self.not_before,
            not_after: self.not_after,
        }
    }
}
