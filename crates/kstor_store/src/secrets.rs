//! Secret persistence.
//!
//! The reachability rule is enforced in SQL: every query joins
//! `secret_values` to the reader's `group_members` rows, so a non-member
//! simply sees an empty result.

use sqlx::SqliteConnection;

use kstor_crypto::ArmoredHidden;
use kstor_model::{Group, Secret};

use crate::error::StoreError;
use crate::models::{GroupRow, SecretRow};
use crate::Store;

const REACHABLE_SELECT: &str = "SELECT s.id, s.value_author_id, s.meta_author_id, \
     sv.group_id, sv.ciphertext, sv.encrypted_metadata \
     FROM secrets s \
     JOIN secret_values sv ON sv.secret_id = s.id \
     JOIN group_members gm ON gm.group_id = sv.group_id \
     WHERE gm.user_id = ?";

impl Store {
    pub async fn create_secret(
        &self,
        conn: &mut SqliteConnection,
        value_author_id: i64,
        meta_author_id: i64,
    ) -> Result<i64, StoreError> {
        let result =
            sqlx::query("INSERT INTO secrets (value_author_id, meta_author_id) VALUES (?, ?)")
                .bind(value_author_id)
                .bind(meta_author_id)
                .execute(&mut *conn)
                .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_secret_value(
        &self,
        conn: &mut SqliteConnection,
        secret_id: i64,
        group_id: i64,
        ciphertext: &ArmoredHidden,
        encrypted_metadata: &ArmoredHidden,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO secret_values (secret_id, group_id, ciphertext, encrypted_metadata) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(secret_id)
        .bind(group_id)
        .bind(ciphertext.to_armored())
        .bind(encrypted_metadata.to_armored())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Every secret reachable by `user_id`, one row per secret. When a
    /// secret is reachable through several groups the row kept is the one
    /// first in (secret_id, group_id) order, so the choice is deterministic.
    pub async fn secrets_for_user(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Vec<Secret>, StoreError> {
        let rows = sqlx::query_as::<_, SecretRow>(&format!(
            "{REACHABLE_SELECT} ORDER BY s.id, sv.group_id"
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut secrets: Vec<Secret> = Vec::new();
        for row in rows {
            if secrets.last().map(|s| s.id) == Some(row.id) {
                continue;
            }
            secrets.push(row.into_secret()?);
        }
        Ok(secrets)
    }

    /// The single row of `secret_id` reachable by `user_id`, if any.
    pub async fn secret_for_user(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        secret_id: i64,
    ) -> Result<Option<Secret>, StoreError> {
        let row = sqlx::query_as::<_, SecretRow>(&format!(
            "{REACHABLE_SELECT} AND s.id = ? ORDER BY s.id, sv.group_id LIMIT 1"
        ))
        .bind(user_id)
        .bind(secret_id)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(SecretRow::into_secret).transpose()
    }

    /// All groups currently sharing a secret.
    pub async fn groups_of_secret(
        &self,
        conn: &mut SqliteConnection,
        secret_id: i64,
    ) -> Result<Vec<Group>, StoreError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT g.id, g.name, g.pubk FROM groups g \
             JOIN secret_values sv ON sv.group_id = g.id \
             WHERE sv.secret_id = ? ORDER BY g.id",
        )
        .bind(secret_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(GroupRow::into_group).collect()
    }

    pub async fn set_value_ciphertext(
        &self,
        conn: &mut SqliteConnection,
        secret_id: i64,
        group_id: i64,
        ciphertext: &ArmoredHidden,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE secret_values SET ciphertext = ? WHERE secret_id = ? AND group_id = ?",
        )
        .bind(ciphertext.to_armored())
        .bind(secret_id)
        .bind(group_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn set_meta_ciphertext(
        &self,
        conn: &mut SqliteConnection,
        secret_id: i64,
        group_id: i64,
        encrypted_metadata: &ArmoredHidden,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE secret_values SET encrypted_metadata = ? \
             WHERE secret_id = ? AND group_id = ?",
        )
        .bind(encrypted_metadata.to_armored())
        .bind(secret_id)
        .bind(group_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn set_value_author(
        &self,
        conn: &mut SqliteConnection,
        secret_id: i64,
        user_id: i64,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE secrets SET value_author_id = ? WHERE id = ?")
            .bind(user_id)
            .bind(secret_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn set_meta_author(
        &self,
        conn: &mut SqliteConnection,
        secret_id: i64,
        user_id: i64,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE secrets SET meta_author_id = ? WHERE id = ?")
            .bind(user_id)
            .bind(secret_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Delete a secret and, by cascade, all its per-group sealed copies.
    pub async fn delete_secret(
        &self,
        conn: &mut SqliteConnection,
        secret_id: i64,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM secrets WHERE id = ?")
            .bind(secret_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
