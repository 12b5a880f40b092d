//! Structured secret metadata.
//!
//! A `SecretMeta` describes what a secret is for (application, database,
//! login, server, URL) without revealing the secret itself. It is encrypted
//! at rest exactly like the secret value; search works by decrypting
//! candidates and glob-matching field by field.

use glob_match::glob_match;
use serde::{Deserialize, Serialize};

/// Metadata attached to a secret. Absent fields are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SecretMeta {
    /// True when every field set in `pattern` glob-matches the corresponding
    /// field here. Matching is case-insensitive on ASCII; an absent pattern
    /// field matches anything; an absent value field matches nothing but an
    /// absent pattern field.
    pub fn matches(&self, pattern: &SecretMeta) -> bool {
        field_matches(&self.app, &pattern.app)
            && field_matches(&self.database, &pattern.database)
            && field_matches(&self.login, &pattern.login)
            && field_matches(&self.server, &pattern.server)
            && field_matches(&self.url, &pattern.url)
    }

    /// Shallow merge: fields set in `partial` replace the ones here.
    pub fn merge(&self, partial: &SecretMeta) -> SecretMeta {
        SecretMeta {
            app: partial.app.clone().or_else(|| self.app.clone()),
            database: partial.database.clone().or_else(|| self.database.clone()),
            login: partial.login.clone().or_else(|| self.login.clone()),
            server: partial.server.clone().or_else(|| self.server.clone()),
            url: partial.url.clone().or_else(|| self.url.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.app.is_none()
            && self.database.is_none()
            && self.login.is_none()
            && self.server.is_none()
            && self.url.is_none()
    }
}

fn field_matches(value: &Option<String>, pattern: &Option<String>) -> bool {
    match (value, pattern) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(v), Some(p)) => glob_match(&p.to_ascii_lowercase(), &v.to_ascii_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(app: &str, login: &str) -> SecretMeta {
        SecretMeta {
            app: Some(app.to_string()),
            login: Some(login.to_string()),
            ..SecretMeta::default()
        }
    }

    #[test]
    fn match_is_reflexive() {
        let m = meta("db", "root");
        assert!(m.matches(&m));
    }

    #[test]
    fn glob_and_case_insensitive() {
        let m = meta("Database", "Root");
        assert!(m.matches(&SecretMeta {
            app: Some("d*".to_string()),
            ..SecretMeta::default()
        }));
        assert!(m.matches(&SecretMeta {
            login: Some("ROOT".to_string()),
            ..SecretMeta::default()
        }));
        assert!(!m.matches(&SecretMeta {
            app: Some("web".to_string()),
            ..SecretMeta::default()
        }));
    }

    #[test]
    fn glob_star_crosses_dots() {
        let m = SecretMeta {
            server: Some("db.internal.example.com".to_string()),
            ..SecretMeta::default()
        };
        assert!(m.matches(&SecretMeta {
            server: Some("db.*".to_string()),
            ..SecretMeta::default()
        }));
    }

    #[test]
    fn empty_pattern_matches_everything() {
        assert!(meta("db", "root").matches(&SecretMeta::default()));
        assert!(SecretMeta::default().matches(&SecretMeta::default()));
    }

    #[test]
    fn absent_value_field_fails_set_pattern() {
        let m = SecretMeta {
            login: Some("root".to_string()),
            ..SecretMeta::default()
        };
        assert!(!m.matches(&SecretMeta {
            app: Some("*".to_string()),
            ..SecretMeta::default()
        }));
    }

    #[test]
    fn merge_is_shallow_and_partial_wins() {
        let base = meta("db", "root");
        let partial = SecretMeta {
            login: Some("admin".to_string()),
            url: Some("https://x".to_string()),
            ..SecretMeta::default()
        };
        let merged = base.merge(&partial);
        assert_eq!(merged.app.as_deref(), Some("db"));
        assert_eq!(merged.login.as_deref(), Some("admin"));
        assert_eq!(merged.url.as_deref(), Some("https://x"));
    }

    #[test]
    fn null_fields_omitted_on_wire() {
        let m = meta("db", "root");
        let json = serde_json::to_string(&m).unwrap();
        assert!(!json.contains("database"));
        assert!(!json.contains("url"));
    }
}
