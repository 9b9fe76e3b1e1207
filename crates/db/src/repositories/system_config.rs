use sqlx::{sqlite::SqliteRow, Row};

use leadflow_core::domain::auto_transfer::SystemConfig;

use super::{encode_timestamp, parse_timestamp, RepositoryError, SystemConfigRepository};
use crate::DbPool;

pub struct SqlSystemConfigRepository {
    pool: DbPool,
}

impl SqlSystemConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SystemConfigRepository for SqlSystemConfigRepository {
    async fn find_enabled(
        &self,
        config_type: &str,
    ) -> Result<Option<SystemConfig>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, config_type, config_key, config_value, is_enabled, updated_at
             FROM system_config
             WHERE config_type = ? AND is_enabled = 1
             ORDER BY updated_at DESC
             LIMIT 1",
        )
        .bind(config_type)
        .fetch_optional(&self.pool)
        .await?;

        row.map(system_config_from_row).transpose()
    }

    async fn save(&self, config: SystemConfig) -> Result<(), RepositoryError> {
        let value = serde_json::to_string(&config.config_value)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO system_config (
                id, config_type, config_key, config_value, is_enabled, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(config_type, config_key) DO UPDATE SET
                config_value = excluded.config_value,
                is_enabled = excluded.is_enabled,
                updated_at = excluded.updated_at",
        )
        .bind(&config.id)
        .bind(&config.config_type)
        .bind(&config.config_key)
        .bind(value)
        .bind(config.is_enabled)
        .bind(encode_timestamp(config.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn system_config_from_row(row: SqliteRow) -> Result<SystemConfig, RepositoryError> {
    let raw_value = row.try_get::<String, _>("config_value")?;
    let config_value = serde_json::from_str(&raw_value).map_err(|error| {
        RepositoryError::Decode(format!("invalid json in `config_value`: {error}"))
    })?;

    Ok(SystemConfig {
        id: row.try_get("id")?,
        config_type: row.try_get("config_type")?,
        config_key: row.try_get("config_key")?,
        config_value,
        is_enabled: row.try_get("is_enabled")?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use leadflow_core::domain::auto_transfer::{
        SystemConfig, AUTO_TRANSFER_CONFIG_KEY, AUTO_TRANSFER_CONFIG_TYPE,
    };

    use super::SqlSystemConfigRepository;
    use crate::migrations;
    use crate::repositories::SystemConfigRepository;
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn save_upserts_on_type_and_key() {
        let pool = setup_pool().await;
        let repo = SqlSystemConfigRepository::new(pool.clone());

        repo.save(config("cfg-1", AUTO_TRANSFER_CONFIG_KEY, 30, true, "2026-03-01T00:00:00Z"))
            .await
            .expect("save first");
        repo.save(config("cfg-2", AUTO_TRANSFER_CONFIG_KEY, 14, true, "2026-03-02T00:00:00Z"))
            .await
            .expect("save second");

        let found = repo
            .find_enabled(AUTO_TRANSFER_CONFIG_TYPE)
            .await
            .expect("find config")
            .expect("config present");

        assert_eq!(found.id, "cfg-1");
        assert_eq!(found.config_value["daysWithoutProgress"], json!(14));
        pool.close().await;
    }

    #[tokio::test]
    async fn disabled_configs_are_invisible() {
        let pool = setup_pool().await;
        let repo = SqlSystemConfigRepository::new(pool.clone());

        repo.save(config("cfg-1", "legacy", 30, false, "2026-03-01T00:00:00Z"))
            .await
            .expect("save disabled");

        assert!(repo.find_enabled(AUTO_TRANSFER_CONFIG_TYPE).await.expect("find").is_none());

        repo.save(config("cfg-2", "current", 7, true, "2026-03-03T00:00:00Z"))
            .await
            .expect("save enabled");
        let found = repo.find_enabled(AUTO_TRANSFER_CONFIG_TYPE).await.expect("find");
        assert_eq!(found.map(|config| config.config_key), Some("current".to_string()));
        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn config(id: &str, key: &str, days: u32, enabled: bool, at: &str) -> SystemConfig {
        SystemConfig {
            id: id.to_string(),
            config_type: AUTO_TRANSFER_CONFIG_TYPE.to_string(),
            config_key: key.to_string(),
            config_value: json!({
                "targetSalesId": "s-9",
                "targetSalesName": "Night Shift",
                "daysWithoutProgress": days,
            }),
            is_enabled: enabled,
            updated_at: DateTime::parse_from_rfc3339(at).expect("timestamp").with_timezone(&Utc),
        }
    }
}
