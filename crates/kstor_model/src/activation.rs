//! Activation tokens — time-bounded one-use secrets that let a `new` user
//! supply their initial passphrase.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

const TOKEN_BYTES: usize = 16;

/// Default validity window, seconds.
pub const DEFAULT_LIFESPAN: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationToken {
    pub user_id: i64,
    pub token: String,
    pub not_before: i64,
    pub not_after: i64,
}

impl ActivationToken {
    pub fn generate(user_id: i64, lifespan_secs: i64) -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let now = epoch_now();
        Self {
            user_id,
            token: kstor_crypto::armor::armor(&bytes),
            not_before: now,
            not_after: now + lifespan_secs.max(0),
        }
    }

    pub fn valid_at(&self, now: i64) -> bool {
        now >= self.not_before && now <= self.not_after
    }

    pub fn valid(&self) -> bool {
        self.valid_at(epoch_now())
    }
}

pub fn epoch_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_bounds_are_inclusive() {
        let token = ActivationToken {
            user_id: 1,
            token: "t".into(),
            not_before: 100,
            not_after: 200,
        };
        assert!(!token.valid_at(99));
        assert!(token.valid_at(100));
        assert!(token.valid_at(200));
        assert!(!token.valid_at(201));
    }

    #[test]
    fn generated_tokens_are_unique() {
        let a = ActivationToken::generate(1, 60);
        let b = ActivationToken::generate(1, 60);
        assert_ne!(a.token, b.token);
        assert!(a.valid());
    }
}
