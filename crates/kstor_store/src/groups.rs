//! Group and membership persistence.

use sqlx::SqliteConnection;

use kstor_crypto::{ArmoredHidden, ArmoredPublicKey};
use kstor_model::{Group, User};

use crate::error::StoreError;
use crate::models::{GroupRow, UserRow};
use crate::Store;

impl Store {
    pub async fn group_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<Group>, StoreError> {
        if let Some(group) = self.cache.get_group(id) {
            return Ok(Some(group));
        }
        let row = sqlx::query_as::<_, GroupRow>("SELECT id, name, pubk FROM groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => {
                let group = row.into_group()?;
                self.cache.put_group(&group);
                Ok(Some(group))
            }
            None => Ok(None),
        }
    }

    pub async fn group_by_name(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
    ) -> Result<Option<Group>, StoreError> {
        let row =
            sqlx::query_as::<_, GroupRow>("SELECT id, name, pubk FROM groups WHERE name = ?")
                .bind(name)
                .fetch_optional(&mut *conn)
                .await?;
        row.map(GroupRow::into_group).transpose()
    }

    pub async fn all_groups(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Group>, StoreError> {
        let rows =
            sqlx::query_as::<_, GroupRow>("SELECT id, name, pubk FROM groups ORDER BY id")
                .fetch_all(&mut *conn)
                .await?;
        rows.into_iter().map(GroupRow::into_group).collect()
    }

    pub async fn create_group(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
        pubk: &ArmoredPublicKey,
    ) -> Result<Group, StoreError> {
        let result = sqlx::query("INSERT INTO groups (name, pubk) VALUES (?, ?)")
            .bind(name)
            .bind(pubk.to_armored())
            .execute(&mut *conn)
            .await?;
        Ok(Group {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            pubk: pubk.clone(),
        })
    }

    pub async fn rename_group(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        name: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE groups SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        self.cache.invalidate_group(id);
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_group(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        self.cache.invalidate_group(id);
        Ok(result.rows_affected() > 0)
    }

    /// Members of a group, with crypto data populated where it exists.
    pub async fn group_members(
        &self,
        conn: &mut SqliteConnection,
        group_id: i64,
    ) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT u.id, u.login, u.name, u.status, \
             c.kdf_params, c.pubk, c.encrypted_privk \
             FROM users u \
             JOIN group_members gm ON gm.user_id = u.id \
             LEFT JOIN users_crypto_data c ON c.user_id = u.id \
             WHERE gm.group_id = ? ORDER BY u.id",
        )
        .bind(group_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    /// Count of members other than `user_id`.
    pub async fn other_member_count(
        &self,
        conn: &mut SqliteConnection,
        group_id: i64,
        user_id: i64,
    ) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM group_members WHERE group_id = ? AND user_id != ?",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?)
    }

    pub async fn add_group_member(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        group_id: i64,
        encrypted_privk: &ArmoredHidden,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO group_members (user_id, group_id, encrypted_privk) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(group_id)
        .bind(encrypted_privk.to_armored())
        .execute(&mut *conn)
        .await?;
        // The target's cached keychain is stale now.
        self.cache.invalidate_user(user_id);
        Ok(())
    }

    pub async fn remove_group_member(
        &self,
        conn: &mut SqliteConnection,
        group_id: i64,
        user_id: i64,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
                .bind(group_id)
                .bind(user_id)
                .execute(&mut *conn)
                .await?;
        self.cache.invalidate_user(user_id);
        Ok(result.rows_affected() > 0)
    }
}
