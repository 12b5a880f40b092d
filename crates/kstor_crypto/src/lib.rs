//! kstor_crypto — KStor cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Everything crossing the crate boundary is an armored (ASCII-safe)
//!   value, never raw bytes.
//!
//! # Module layout
//! - `armor`     — base64url envelope + armored newtypes
//! - `kdf`       — Argon2id passphrase key derivation, `KdfParams`
//! - `secretbox` — XChaCha20-Poly1305 symmetric box (seal/open)
//! - `pairbox`   — X25519 public-key authenticated box (seal/open)
//! - `error`     — unified error type

pub mod armor;
pub mod error;
pub mod kdf;
pub mod pairbox;
pub mod secretbox;

pub use armor::{ArmoredHidden, ArmoredPublicKey};
pub use error::CryptoError;
pub use kdf::{derive_key, params_obsolete, KdfParams, SecretKey};
pub use pairbox::{generate_keypair, open_pair, seal_pair, BoxSecretKey};
pub use secretbox::{open_secret, seal_secret};
