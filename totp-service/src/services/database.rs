//! PostgreSQL implementation of [`SecretStore`].

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::error::ServiceError;
use super::store::SecretStore;
use crate::models::{MfaSecret, ShareGrant};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecretStore for Database {
    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                ServiceError::Database(e)
            })?;
        Ok(())
    }

    // ==================== Secrets ====================

    async fn insert_secret(&self, secret: &MfaSecret) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO mfa_secrets (id, owner_id, name, secret_ciphertext, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(secret.id)
        .bind(&secret.owner_id)
        .bind(&secret.name)
        .bind(&secret.secret_ciphertext)
        .bind(&secret.notes)
        .bind(secret.created_at)
        .bind(secret.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_secret(
        &self,
        owner_id: &str,
        id: Uuid,
    ) -> Result<Option<MfaSecret>, ServiceError> {
        let secret = sqlx::query_as::<_, MfaSecret>(
            "SELECT * FROM mfa_secrets WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(secret)
    }

    async fn find_secret_by_id(&self, id: Uuid) -> Result<Option<MfaSecret>, ServiceError> {
        let secret = sqlx::query_as::<_, MfaSecret>("SELECT * FROM mfa_secrets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(secret)
    }

    async fn list_secrets(&self, owner_id: &str) -> Result<Vec<MfaSecret>, ServiceError> {
        let secrets = sqlx::query_as::<_, MfaSecret>(
            "SELECT * FROM mfa_secrets WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(secrets)
    }

    async fn update_secret(&self, secret: &MfaSecret) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE mfa_secrets
            SET name = $3, secret_ciphertext = $4, notes = $5, updated_at = $6
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(secret.id)
        .bind(&secret.owner_id)
        .bind(&secret.name)
        .bind(&secret.secret_ciphertext)
        .bind(&secret.notes)
        .bind(secret.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rotate_secret(&self, secret: &MfaSecret) -> Result<Option<u64>, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE mfa_secrets
            SET name = $3, secret_ciphertext = $4, notes = $5, updated_at = $6
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(secret.id)
        .bind(&secret.owner_id)
        .bind(&secret.name)
        .bind(&secret.secret_ciphertext)
        .bind(&secret.notes)
        .bind(secret.updated_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let revoked = sqlx::query("DELETE FROM share_grants WHERE secret_id = $1")
            .bind(secret.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(revoked.rows_affected()))
    }

    async fn delete_secret(&self, owner_id: &str, id: Uuid) -> Result<bool, ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM share_grants WHERE secret_id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM mfa_secrets WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Share grants ====================

    async fn insert_grant(&self, grant: &ShareGrant) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO share_grants (
                id, secret_id, owner_id, token_hash, password_hash,
                require_password, embed_password_in_link, expires_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(grant.id)
        .bind(grant.secret_id)
        .bind(&grant.owner_id)
        .bind(&grant.token_hash)
        .bind(&grant.password_hash)
        .bind(grant.require_password)
        .bind(grant.embed_password_in_link)
        .bind(grant.expires_at)
        .bind(grant.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_grant_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<ShareGrant>, ServiceError> {
        let grant =
            sqlx::query_as::<_, ShareGrant>("SELECT * FROM share_grants WHERE token_hash = $1")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(grant)
    }

    async fn list_grants(&self, secret_id: Uuid) -> Result<Vec<ShareGrant>, ServiceError> {
        let grants = sqlx::query_as::<_, ShareGrant>(
            "SELECT * FROM share_grants WHERE secret_id = $1 ORDER BY created_at DESC",
        )
        .bind(secret_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(grants)
    }

    async fn delete_grant(&self, secret_id: Uuid, grant_id: Uuid) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM share_grants WHERE id = $1 AND secret_id = $2")
            .bind(grant_id)
            .bind(secret_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_grants_for_secret(&self, secret_id: Uuid) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM share_grants WHERE secret_id = $1")
            .bind(secret_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
