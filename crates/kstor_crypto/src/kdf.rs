//! Passphrase key derivation — Argon2id.
//!
//! `derive_key` turns a passphrase into the 32-byte symmetric key that
//! seals a user's private key. The parameters used for the derivation
//! travel with the user record (`KdfParams`), so the same key can be
//! re-derived at every login.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::armor::{armor, unarmor};
use crate::error::CryptoError;

/// Argon2 version recorded in freshly generated parameters.
pub const KDF_VERSION: u32 = Version::V0x13 as u32;

/// Symmetric key length; also the KDF digest size.
pub const KEY_BYTES: usize = 32;

const SALT_BYTES: usize = 16;

// Moderate interactive-use costs.
const DEFAULT_OPSLIMIT: u32 = 3;
const DEFAULT_MEMLIMIT_KIB: u32 = 64 * 1024;

/// KDF parameters stored alongside a user's encrypted private key.
/// Not secret; armored as JSON for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub version: u32,
    /// Hex-encoded random salt.
    pub salt: String,
    /// Argon2 iteration count (t_cost).
    pub opslimit: u32,
    /// Argon2 memory cost in KiB (m_cost).
    pub memlimit: u32,
    pub digest_size: u32,
}

impl KdfParams {
    /// Fresh parameters with a random salt and moderate costs.
    pub fn fresh() -> Self {
        let mut salt = [0u8; SALT_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        Self {
            version: KDF_VERSION,
            salt: hex::encode(salt),
            opslimit: DEFAULT_OPSLIMIT,
            memlimit: DEFAULT_MEMLIMIT_KIB,
            digest_size: KEY_BYTES as u32,
        }
    }

    pub fn to_armored(&self) -> Result<String, CryptoError> {
        Ok(armor(&serde_json::to_vec(self)?))
    }

    pub fn from_armored(s: &str) -> Result<Self, CryptoError> {
        Ok(serde_json::from_slice(&unarmor(s)?)?)
    }
}

/// True when parameters were produced by a different Argon2 version than the
/// one this build links against. The caller SHOULD re-derive and re-encrypt.
pub fn params_obsolete(params: &KdfParams) -> bool {
    params.version != KDF_VERSION
}

/// Passphrase-derived symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct SecretKey {
    value: Zeroizing<[u8; KEY_BYTES]>,
    pub params: KdfParams,
}

impl SecretKey {
    pub fn bytes(&self) -> &[u8; KEY_BYTES] {
        &self.value
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("value", &"<redacted>")
            .field("params", &self.params)
            .finish()
    }
}

/// Derive a symmetric key from a passphrase. When `params` is `None`, fresh
/// parameters are generated and recorded on the returned key.
pub fn derive_key(passphrase: &str, params: Option<KdfParams>) -> Result<SecretKey, CryptoError> {
    let params = params.unwrap_or_else(KdfParams::fresh);
    if params.digest_size as usize != KEY_BYTES {
        return Err(CryptoError::BadKey(format!(
            "unsupported KDF digest size {}",
            params.digest_size
        )));
    }
    let salt = hex::decode(&params.salt)?;
    let version =
        Version::try_from(params.version).map_err(|e| CryptoError::Kdf(e.to_string()))?;
    let argon_params = Params::new(
        params.memlimit,
        params.opslimit,
        1,
        Some(KEY_BYTES),
    )
    .map_err(|e| CryptoError::Kdf(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, version, argon_params);

    let mut value = Zeroizing::new([0u8; KEY_BYTES]);
    argon2
        .hash_password_into(passphrase.as_bytes(), &salt, value.as_mut_slice())
        .map_err(|e| CryptoError::Kdf(e.to_string()))?;
    Ok(SecretKey { value, params })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_passphrase_same_params_same_key() {
        let k1 = derive_key("hunter2", None).unwrap();
        let k2 = derive_key("hunter2", Some(k1.params.clone())).unwrap();
        assert_eq!(k1.bytes(), k2.bytes());
    }

    #[test]
    fn fresh_params_differ_by_salt() {
        let k1 = derive_key("hunter2", None).unwrap();
        let k2 = derive_key("hunter2", None).unwrap();
        assert_ne!(k1.params.salt, k2.params.salt);
        assert_ne!(k1.bytes(), k2.bytes());
    }

    #[test]
    fn params_armor_roundtrip() {
        let params = KdfParams::fresh();
        let armored = params.to_armored().unwrap();
        assert_eq!(KdfParams::from_armored(&armored).unwrap(), params);
    }

    #[test]
    fn obsolete_version_detected() {
        let mut params = KdfParams::fresh();
        assert!(!params_obsolete(&params));
        params.version = 0x10;
        assert!(params_obsolete(&params));
    }
}
