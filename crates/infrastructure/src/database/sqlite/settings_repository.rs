use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use pricewatch_core::errors::PricewatchResult;
use pricewatch_core::traits::SettingsRepository;

/// 运行期设置的SQLite键值存储
pub struct SqliteSettingsRepository {
    pool: SqlitePool,
}

impl SqliteSettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn get(&self, key: &str) -> PricewatchResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get("value")?),
            None => None,
        })
    }

    async fn set(&self, key: &str, value: &str) -> PricewatchResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::SqliteDatabase;
    use pricewatch_core::config::{setting_keys, AppConfig};
    use pricewatch_core::settings::RuntimeSettings;

    async fn repo() -> SqliteSettingsRepository {
        let db = SqliteDatabase::connect_in_memory().await.unwrap();
        SqliteSettingsRepository::new(db.pool())
    }

    #[tokio::test]
    async fn test_get_set_roundtrip_and_overwrite() {
        let repo = repo().await;
        assert!(repo.get("queue.interval_ms").await.unwrap().is_none());

        repo.set("queue.interval_ms", "60000").await.unwrap();
        assert_eq!(
            repo.get("queue.interval_ms").await.unwrap().as_deref(),
            Some("60000")
        );

        repo.set("queue.interval_ms", "90000").await.unwrap();
        assert_eq!(
            repo.get("queue.interval_ms").await.unwrap().as_deref(),
            Some("90000")
        );
    }

    #[tokio::test]
    async fn test_runtime_settings_override_config_defaults() {
        let repo = repo().await;
        repo.set(setting_keys::CACHE_HOURS, "24").await.unwrap();
        repo.set(setting_keys::MAX_VALID_PRICE, "not-a-number")
            .await
            .unwrap();

        let config = AppConfig::default();
        let settings = RuntimeSettings::load(&repo, &config).await.unwrap();
        // Stored override applies; unparsable entries fall back.
        assert_eq!(settings.cache_hours, 24);
        assert_eq!(settings.max_valid_price, config.scraping.max_valid_price);
        assert_eq!(settings.queue_interval_ms, config.queue.interval_ms);
    }
}
