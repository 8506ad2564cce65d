use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use pricewatch_core::errors::PricewatchResult;
use pricewatch_core::models::ScraperRun;
use pricewatch_core::traits::ScraperRunRepository;

/// 运行记录仓储的SQLite实现（追加式）
pub struct SqliteRunRepository {
    pool: SqlitePool,
}

impl SqliteRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> PricewatchResult<ScraperRun> {
        Ok(ScraperRun {
            id: row.try_get("id")?,
            product_scraper_id: row.try_get("product_scraper_id")?,
            status: row.try_get("status")?,
            prices_found: row.try_get("prices_found")?,
            prices_saved: row.try_get("prices_saved")?,
            error_message: row.try_get("error_message")?,
            log: row.try_get("log")?,
            duration_ms: row.try_get("duration_ms")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ScraperRunRepository for SqliteRunRepository {
    async fn create(&self, run: &ScraperRun) -> PricewatchResult<ScraperRun> {
        let result = sqlx::query(
            r#"
            INSERT INTO scraper_runs
                (product_scraper_id, status, prices_found, prices_saved,
                 error_message, log, duration_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.product_scraper_id)
        .bind(run.status)
        .bind(run.prices_found)
        .bind(run.prices_saved)
        .bind(&run.error_message)
        .bind(&run.log)
        .bind(run.duration_ms)
        .bind(run.created_at)
        .execute(&self.pool)
        .await?;

        let mut created = run.clone();
        created.id = result.last_insert_rowid();
        debug!(
            "记录抓取器 {} 的运行 {} ({})",
            created.product_scraper_id, created.id, created.status
        );
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> PricewatchResult<Option<ScraperRun>> {
        let row = sqlx::query("SELECT * FROM scraper_runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn get_last_successful_run(
        &self,
        product_scraper_id: i64,
    ) -> PricewatchResult<Option<ScraperRun>> {
        // 只有真正的SUCCESS推进缓存时钟; warning/cached不算
        let row = sqlx::query(
            r#"
            SELECT * FROM scraper_runs
            WHERE product_scraper_id = ? AND status = 'SUCCESS'
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(product_scraper_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn get_recent_runs(
        &self,
        product_scraper_id: i64,
        limit: i64,
    ) -> PricewatchResult<Vec<ScraperRun>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM scraper_runs
            WHERE product_scraper_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(product_scraper_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn cleanup_old_runs(&self, days: i32) -> PricewatchResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(days as i64);
        let result = sqlx::query("DELETE FROM scraper_runs WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::SqliteDatabase;
    use pricewatch_core::models::ScrapeStatus;

    async fn repo() -> SqliteRunRepository {
        let db = SqliteDatabase::connect_in_memory().await.unwrap();
        let pool = db.pool();
        // Parent rows for the foreign key on scraper_runs.
        for product_id in [1, 2] {
            sqlx::query(
                "INSERT INTO product_scrapers \
                 (product_id, scraper_type, url, created_at, updated_at) \
                 VALUES (?, 'STATIC_HTML', 'https://example.com', ?, ?)",
            )
            .bind(product_id)
            .bind(Utc::now())
            .bind(Utc::now())
            .execute(&pool)
            .await
            .unwrap();
        }
        SqliteRunRepository::new(pool)
    }

    fn run(scraper_id: i64, status: ScrapeStatus) -> ScraperRun {
        let mut run = ScraperRun::new(scraper_id, status);
        run.prices_found = 1;
        run.prices_saved = 1;
        run.log = "第1层: 直接抓取".to_string();
        run.duration_ms = 450;
        run
    }

    #[tokio::test]
    async fn test_create_and_fetch_run() {
        let repo = repo().await;
        let created = repo.create(&run(1, ScrapeStatus::Success)).await.unwrap();
        assert!(created.id > 0);

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ScrapeStatus::Success);
        assert_eq!(fetched.log, "第1层: 直接抓取");
        assert_eq!(fetched.duration_ms, 450);
    }

    #[tokio::test]
    async fn test_last_successful_ignores_warning_and_cached() {
        let repo = repo().await;
        let mut success = run(1, ScrapeStatus::Success);
        success.created_at = Utc::now() - chrono::Duration::hours(5);
        let persisted = repo.create(&success).await.unwrap();

        // Newer runs that must not advance the cache clock.
        repo.create(&run(1, ScrapeStatus::Warning)).await.unwrap();
        repo.create(&run(1, ScrapeStatus::Cached)).await.unwrap();
        repo.create(&run(1, ScrapeStatus::Error)).await.unwrap();

        let last = repo.get_last_successful_run(1).await.unwrap().unwrap();
        assert_eq!(last.id, persisted.id);
        assert_eq!(last.status, ScrapeStatus::Success);
    }

    #[tokio::test]
    async fn test_last_successful_scoped_per_scraper() {
        let repo = repo().await;
        repo.create(&run(2, ScrapeStatus::Success)).await.unwrap();
        assert!(repo.get_last_successful_run(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_runs_newest_first_with_limit() {
        let repo = repo().await;
        for i in 0..5 {
            let mut r = run(1, ScrapeStatus::Success);
            r.created_at = Utc::now() - chrono::Duration::minutes(10 - i);
            repo.create(&r).await.unwrap();
        }
        let recent = repo.get_recent_runs(1, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[0].created_at >= recent[1].created_at);
        assert!(recent[1].created_at >= recent[2].created_at);
    }

    #[tokio::test]
    async fn test_cleanup_old_runs() {
        let repo = repo().await;
        let mut old = run(1, ScrapeStatus::Success);
        old.created_at = Utc::now() - chrono::Duration::days(120);
        repo.create(&old).await.unwrap();
        repo.create(&run(1, ScrapeStatus::Success)).await.unwrap();

        let deleted = repo.cleanup_old_runs(90).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.get_recent_runs(1, 10).await.unwrap().len(), 1);
    }
}
