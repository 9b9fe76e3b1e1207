use chrono::{DateTime, Utc};
use sqlx::Row;

use leadflow_core::domain::work_item::WorkItem;

use super::{encode_timestamp, RepositoryError, WorkItemRepository};
use crate::DbPool;

pub struct SqlWorkItemRepository {
    pool: DbPool,
}

impl SqlWorkItemRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl WorkItemRepository for SqlWorkItemRepository {
    async fn has_visible_work_items(&self, customer_id: &str) -> Result<bool, RepositoryError> {
        let count = sqlx::query(
            "SELECT COUNT(*) AS count FROM project WHERE customer_id = ? AND web_hidden = 0",
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?
        .try_get::<i64, _>("count")?;

        Ok(count > 0)
    }

    async fn hide_all_for_customer(
        &self,
        customer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE project SET web_hidden = 1, updated_at = ?
             WHERE customer_id = ? AND web_hidden = 0",
        )
        .bind(encode_timestamp(at))
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn save(&self, item: WorkItem) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO project (id, customer_id, name, web_hidden, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                customer_id = excluded.customer_id,
                name = excluded.name,
                web_hidden = excluded.web_hidden,
                updated_at = excluded.updated_at",
        )
        .bind(&item.id)
        .bind(&item.customer_id)
        .bind(&item.name)
        .bind(item.web_hidden)
        .bind(encode_timestamp(item.created_at))
        .bind(encode_timestamp(item.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
