//! User persistence.

use sqlx::SqliteConnection;

use kstor_model::{User, UserStatus};

use crate::error::StoreError;
use crate::models::{KeychainRow, UserRow};
use crate::Store;

const USER_SELECT: &str = "SELECT u.id, u.login, u.name, u.status, \
     c.kdf_params, c.pubk, c.encrypted_privk \
     FROM users u LEFT JOIN users_crypto_data c ON c.user_id = u.id";

impl Store {
    pub async fn user_count(&self, conn: &mut SqliteConnection) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *conn)
            .await?)
    }

    pub async fn user_by_login(
        &self,
        conn: &mut SqliteConnection,
        login: &str,
    ) -> Result<Option<User>, StoreError> {
        if let Some(user) = self.cache.get_user_by_login(login) {
            return Ok(Some(user));
        }
        let row = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} WHERE u.login = ?"))
            .bind(login)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => Ok(Some(self.finish_user(conn, row).await?)),
            None => Ok(None),
        }
    }

    pub async fn user_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<User>, StoreError> {
        if let Some(user) = self.cache.get_user(id) {
            return Ok(Some(user));
        }
        let row = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} WHERE u.id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => Ok(Some(self.finish_user(conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn finish_user(
        &self,
        conn: &mut SqliteConnection,
        row: UserRow,
    ) -> Result<User, StoreError> {
        let mut user = row.into_user()?;
        let items = sqlx::query_as::<_, KeychainRow>(
            "SELECT gm.group_id, g.pubk AS group_pubk, gm.encrypted_privk \
             FROM group_members gm JOIN groups g ON g.id = gm.group_id \
             WHERE gm.user_id = ? ORDER BY gm.group_id",
        )
        .bind(user.id)
        .fetch_all(&mut *conn)
        .await?;
        for item in items {
            let item = item.into_item()?;
            user.keychain.insert(item.group_id, item);
        }
        self.cache.put_user(&user);
        Ok(user)
    }

    pub async fn create_user(
        &self,
        conn: &mut SqliteConnection,
        login: &str,
        name: &str,
        status: UserStatus,
    ) -> Result<i64, StoreError> {
        let result = sqlx::query("INSERT INTO users (login, name, status) VALUES (?, ?, ?)")
            .bind(login)
            .bind(name)
            .bind(status.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Persist the user's sealed crypto data (KDF params, public key,
    /// encrypted private key).
    pub async fn save_user_crypto(
        &self,
        conn: &mut SqliteConnection,
        user: &User,
    ) -> Result<(), StoreError> {
        let (Some(params), Some(pubk), Some(encrypted_privk)) =
            (&user.kdf_params, &user.pubk, &user.encrypted_privk)
        else {
            return Err(StoreError::Corrupt(format!(
                "refusing to persist incomplete crypto data for user {}",
                user.login
            )));
        };
        sqlx::query(
            "INSERT INTO users_crypto_data (user_id, kdf_params, pubk, encrypted_privk) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT (user_id) DO UPDATE SET \
             kdf_params = excluded.kdf_params, pubk = excluded.pubk, \
             encrypted_privk = excluded.encrypted_privk",
        )
        .bind(user.id)
        .bind(params.to_armored()?)
        .bind(pubk.to_armored())
        .bind(encrypted_privk.to_armored())
        .execute(&mut *conn)
        .await?;
        self.cache.invalidate_user(user.id);
        Ok(())
    }

    /// Persist re-sealed keychain items (after a passphrase rotation).
    pub async fn save_user_keychain(
        &self,
        conn: &mut SqliteConnection,
        user: &User,
    ) -> Result<(), StoreError> {
        for item in user.keychain.values() {
            sqlx::query(
                "UPDATE group_members SET encrypted_privk = ? \
                 WHERE user_id = ? AND group_id = ?",
            )
            .bind(item.encrypted_privk.to_armored())
            .bind(user.id)
            .bind(item.group_id)
            .execute(&mut *conn)
            .await?;
        }
        self.cache.invalidate_user(user.id);
        Ok(())
    }

    pub async fn set_user_status(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        status: UserStatus,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        self.cache.invalidate_user(user_id);
        Ok(())
    }
}
