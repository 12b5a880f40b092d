//! kstor_store — SQLite persistence for KStor
//!
//! # Encryption strategy
//! SQLite does NOT natively encrypt. Sensitive columns (private keys, secret
//! values, secret metadata) are stored as armored ciphertext produced by the
//! crypto layer; the repository never sees a decryption key. Routing data
//! (ids, logins, group names, statuses) is plaintext to allow efficient
//! queries.
//!
//! # Transactions
//! The repository operates on `&mut SqliteConnection`, so the dispatcher can
//! run a whole request inside one transaction and roll it back by dropping.
//!
//! # Cache
//! Users and groups are cached process-wide behind a read-write lock,
//! invalidated by key on every write touching them. Cached users are locked
//! copies: plaintext key material never enters the cache.

pub mod cache;
pub mod db;
pub mod error;
pub mod models;

mod activations;
mod groups;
mod secrets;
mod users;

pub use db::Store;
pub use error::StoreError;
