//! Activation token persistence.

use sqlx::SqliteConnection;

use kstor_model::ActivationToken;

use crate::error::StoreError;
use crate::models::ActivationRow;
use crate::Store;

impl Store {
    pub async fn create_activation(
        &self,
        conn: &mut SqliteConnection,
        token: &ActivationToken,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO user_activations (user_id, token, not_before, not_after) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(token.user_id)
        .bind(&token.token)
        .bind(token.not_before)
        .bind(token.not_after)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn activations_for_user(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Vec<ActivationToken>, StoreError> {
        let rows = sqlx::query_as::<_, ActivationRow>(
            "SELECT user_id, token, not_before, not_after \
             FROM user_activations WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(ActivationRow::into_token).collect())
    }

    pub async fn purge_activations(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM user_activations WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
