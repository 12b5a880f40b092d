//! Secrets.
//!
//! A logical secret is one `secrets` row plus one sealed copy per sharing
//! group. The copy a reader sees is the one reachable through their own
//! membership (`group_id`); value and metadata are sealed independently,
//! each from the author's keypair to the group's.

use zeroize::Zeroizing;

use kstor_crypto::{open_pair, seal_pair, ArmoredHidden, ArmoredPublicKey, BoxSecretKey};
use kstor_proto::SecretMeta;

use crate::error::ModelError;

#[derive(Debug, Clone)]
pub struct Secret {
    pub id: i64,
    /// The group through which the current reader reached this secret.
    pub group_id: i64,
    pub value_author_id: i64,
    pub meta_author_id: i64,
    pub ciphertext: ArmoredHidden,
    pub encrypted_metadata: ArmoredHidden,
    /// Present only after `unlock_value`.
    pub plaintext: Option<Zeroizing<Vec<u8>>>,
    /// Present only after `unlock_metadata`.
    pub metadata: Option<SecretMeta>,
}

impl Secret {
    /// Seal a plaintext value from the author to one group.
    pub fn seal_value(
        group_pubk: &ArmoredPublicKey,
        author_privk: &BoxSecretKey,
        plaintext: &[u8],
    ) -> Result<ArmoredHidden, ModelError> {
        Ok(seal_pair(group_pubk, author_privk, plaintext)?)
    }

    /// Seal metadata from the author to one group.
    pub fn seal_metadata(
        group_pubk: &ArmoredPublicKey,
        author_privk: &BoxSecretKey,
        meta: &SecretMeta,
    ) -> Result<ArmoredHidden, ModelError> {
        let bytes = serde_json::to_vec(meta)?;
        Ok(seal_pair(group_pubk, author_privk, &bytes)?)
    }

    pub fn unlock_value(
        &mut self,
        value_author_pubk: &ArmoredPublicKey,
        group_privk: &BoxSecretKey,
    ) -> Result<&[u8], ModelError> {
        if self.plaintext.is_none() {
            self.plaintext = Some(open_pair(value_author_pubk, group_privk, &self.ciphertext)?);
        }
        Ok(self.plaintext.as_ref().expect("just unlocked"))
    }

    pub fn unlock_metadata(
        &mut self,
        meta_author_pubk: &ArmoredPublicKey,
        group_privk: &BoxSecretKey,
    ) -> Result<&SecretMeta, ModelError> {
        if self.metadata.is_none() {
            let bytes = open_pair(meta_author_pubk, group_privk, &self.encrypted_metadata)?;
            self.metadata = Some(serde_json::from_slice(&bytes)?);
        }
        Ok(self.metadata.as_ref().expect("just unlocked"))
    }

    pub fn lock(&mut self) {
        self.plaintext = None;
        self.metadata = None;
    }
}
