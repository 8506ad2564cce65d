use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use pricewatch_core::errors::{PricewatchError, PricewatchResult};
use pricewatch_core::models::{ProductScraper, ScrapeStatus};
use pricewatch_core::traits::ProductScraperRepository;

/// 抓取器仓储的SQLite实现
pub struct SqliteScraperRepository {
    pool: SqlitePool,
}

impl SqliteScraperRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> PricewatchResult<ProductScraper> {
        Ok(ProductScraper {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            scraper_type: row.try_get("scraper_type")?,
            url: row.try_get("url")?,
            scrape_hints: row.try_get("scrape_hints")?,
            interval_minutes: row.try_get("interval_minutes")?,
            enabled: row.try_get("enabled")?,
            last_scraped_at: row.try_get("last_scraped_at")?,
            last_scrape_status: row.try_get("last_scrape_status")?,
            last_scrape_error: row.try_get("last_scrape_error")?,
            issue_dismissed_at: row.try_get("issue_dismissed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ProductScraperRepository for SqliteScraperRepository {
    async fn create(&self, scraper: &ProductScraper) -> PricewatchResult<ProductScraper> {
        let result = sqlx::query(
            r#"
            INSERT INTO product_scrapers
                (product_id, scraper_type, url, scrape_hints, interval_minutes,
                 enabled, last_scraped_at, last_scrape_status, last_scrape_error,
                 issue_dismissed_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(scraper.product_id)
        .bind(scraper.scraper_type)
        .bind(&scraper.url)
        .bind(&scraper.scrape_hints)
        .bind(scraper.interval_minutes)
        .bind(scraper.enabled)
        .bind(scraper.last_scraped_at)
        .bind(scraper.last_scrape_status)
        .bind(&scraper.last_scrape_error)
        .bind(scraper.issue_dismissed_at)
        .bind(scraper.created_at)
        .bind(scraper.updated_at)
        .execute(&self.pool)
        .await?;

        let mut created = scraper.clone();
        created.id = result.last_insert_rowid();
        debug!("创建抓取器 {} (商品 {})", created.id, created.product_id);
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> PricewatchResult<Option<ProductScraper>> {
        let row = sqlx::query("SELECT * FROM product_scrapers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn get_by_product_id(&self, product_id: i64) -> PricewatchResult<Vec<ProductScraper>> {
        let rows = sqlx::query("SELECT * FROM product_scrapers WHERE product_id = ? ORDER BY id")
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn update(&self, scraper: &ProductScraper) -> PricewatchResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE product_scrapers
            SET scraper_type = ?, url = ?, scrape_hints = ?, interval_minutes = ?,
                enabled = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(scraper.scraper_type)
        .bind(&scraper.url)
        .bind(&scraper.scrape_hints)
        .bind(scraper.interval_minutes)
        .bind(scraper.enabled)
        .bind(Utc::now())
        .bind(scraper.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PricewatchError::ScraperNotFound { id: scraper.id });
        }
        Ok(())
    }

    async fn get_scrapers_needing_run(&self) -> PricewatchResult<Vec<ProductScraper>> {
        // 到期判定复用模型上的 is_due, 避免SQL侧时间运算与
        // 存储格式耦合; 启用中的抓取器数量对单机部署很小
        let rows = sqlx::query("SELECT * FROM product_scrapers WHERE enabled = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let now = Utc::now();
        let scrapers: PricewatchResult<Vec<ProductScraper>> =
            rows.iter().map(Self::map_row).collect();
        Ok(scrapers?.into_iter().filter(|s| s.is_due(now)).collect())
    }

    async fn mark_as_run(
        &self,
        id: i64,
        status: ScrapeStatus,
        error: Option<&str>,
    ) -> PricewatchResult<()> {
        let error_text = if status == ScrapeStatus::Error {
            error
        } else {
            None
        };
        let result = sqlx::query(
            r#"
            UPDATE product_scrapers
            SET last_scraped_at = ?, last_scrape_status = ?, last_scrape_error = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(status)
        .bind(error_text)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PricewatchError::ScraperNotFound { id });
        }
        Ok(())
    }

    async fn get_scrapers_with_issues(&self) -> PricewatchResult<Vec<ProductScraper>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM product_scrapers
            WHERE enabled = 1
              AND (last_scrape_status IN ('ERROR', 'WARNING') OR last_scraped_at IS NULL)
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        let scrapers: PricewatchResult<Vec<ProductScraper>> =
            rows.iter().map(Self::map_row).collect();
        // 忽略逻辑（忽略后未再执行的不显示）由模型统一判定
        Ok(scrapers?.into_iter().filter(|s| s.has_issue()).collect())
    }

    async fn dismiss_issue(&self, id: i64, dismissed_at: DateTime<Utc>) -> PricewatchResult<()> {
        let result =
            sqlx::query("UPDATE product_scrapers SET issue_dismissed_at = ?, updated_at = ? WHERE id = ?")
                .bind(dismissed_at)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(PricewatchError::ScraperNotFound { id });
        }
        Ok(())
    }
}
