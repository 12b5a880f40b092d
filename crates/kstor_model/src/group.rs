//! Groups.
//!
//! A group owns a keypair, but only the public half is ever persisted on
//! the group itself: the private key lives exclusively as sealed entries in
//! member keychains. Deleting the last keychain item for a group destroys
//! all means of reading anything shared with it.

use kstor_crypto::ArmoredPublicKey;

#[derive(Debug, Clone)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub pubk: ArmoredPublicKey,
}
