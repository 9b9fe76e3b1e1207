use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use leadflow_core::domain::operator::{Operator, Role};

use super::{encode_timestamp, OperatorTokenRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOperatorTokenRepository {
    pool: DbPool,
}

impl SqlOperatorTokenRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OperatorTokenRepository for SqlOperatorTokenRepository {
    async fn find_operator(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Operator>, RepositoryError> {
        let row = sqlx::query(
            "SELECT operator_id, operator_name, role FROM operator_token
             WHERE token_hash = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(token_hash)
        .bind(encode_timestamp(now))
        .fetch_optional(&self.pool)
        .await?;

        row.map(operator_from_row).transpose()
    }

    async fn save(
        &self,
        token_hash: &str,
        operator: Operator,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO operator_token (
                token_hash, operator_id, operator_name, role, expires_at, created_at
             ) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(token_hash) DO UPDATE SET
                operator_id = excluded.operator_id,
                operator_name = excluded.operator_name,
                role = excluded.role,
                expires_at = excluded.expires_at",
        )
        .bind(token_hash)
        .bind(&operator.id)
        .bind(&operator.name)
        .bind(operator.role.as_str())
        .bind(expires_at.map(encode_timestamp))
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn operator_from_row(row: SqliteRow) -> Result<Operator, RepositoryError> {
    let role_raw = row.try_get::<String, _>("role")?;
    let role = Role::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown operator role `{role_raw}`")))?;

    Ok(Operator { id: row.try_get("operator_id")?, name: row.try_get("operator_name")?, role })
}
