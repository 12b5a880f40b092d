//! kstor_model — KStor domain model
//!
//! Plain structs with typed fields. Every entity that carries key material
//! has an explicit locked/unlocked transition: ciphertext fields are always
//! populated, plaintext fields exist only between `unlock` and `lock`
//! within a single request.

pub mod activation;
pub mod error;
pub mod group;
pub mod secret;
pub mod user;

pub use activation::ActivationToken;
pub use error::ModelError;
pub use group::Group;
pub use secret::Secret;
pub use user::{KeychainItem, User, UserStatus};
