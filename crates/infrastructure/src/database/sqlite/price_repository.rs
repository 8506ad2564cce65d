use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use pricewatch_core::errors::PricewatchResult;
use pricewatch_core::models::{PriceRecord, Retailer};
use pricewatch_core::traits::PriceRepository;

/// 价格仓储的SQLite实现
pub struct SqlitePriceRepository {
    pool: SqlitePool,
}

impl SqlitePriceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_record(row: &SqliteRow) -> PricewatchResult<PriceRecord> {
        Ok(PriceRecord {
            id: row.try_get("id")?,
            product_scraper_id: row.try_get("product_scraper_id")?,
            retailer_id: row.try_get("retailer_id")?,
            price: row.try_get("price")?,
            currency: row.try_get("currency")?,
            in_stock: row.try_get("in_stock")?,
            availability: row.try_get("availability")?,
            product_url: row.try_get("product_url")?,
            unit_count: row.try_get("unit_count")?,
            unit_type: row.try_get("unit_type")?,
            price_per_unit: row.try_get("price_per_unit")?,
            multi_buy_quantity: row.try_get("multi_buy_quantity")?,
            multi_buy_price: row.try_get("multi_buy_price")?,
            multi_buy_price_per_unit: row.try_get("multi_buy_price_per_unit")?,
            scraped_at: row.try_get("scraped_at")?,
        })
    }
}

#[async_trait]
impl PriceRepository for SqlitePriceRepository {
    async fn get_or_create_retailer(
        &self,
        name: &str,
        domain: Option<&str>,
    ) -> PricewatchResult<Retailer> {
        if let Some(row) = sqlx::query("SELECT id, name, domain FROM retailers WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(Retailer {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                domain: row.try_get("domain")?,
            });
        }

        let result = sqlx::query("INSERT INTO retailers (name, domain) VALUES (?, ?)")
            .bind(name)
            .bind(domain)
            .execute(&self.pool)
            .await?;
        debug!("创建零售商 {name}");
        Ok(Retailer {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            domain: domain.map(|d| d.to_string()),
        })
    }

    async fn create_price_records(&self, records: &[PriceRecord]) -> PricewatchResult<()> {
        // 单事务批量插入
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO price_records
                    (product_scraper_id, retailer_id, price, currency, in_stock,
                     availability, product_url, unit_count, unit_type, price_per_unit,
                     multi_buy_quantity, multi_buy_price, multi_buy_price_per_unit,
                     scraped_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(record.product_scraper_id)
            .bind(record.retailer_id)
            .bind(record.price)
            .bind(&record.currency)
            .bind(record.in_stock)
            .bind(&record.availability)
            .bind(&record.product_url)
            .bind(record.unit_count)
            .bind(&record.unit_type)
            .bind(record.price_per_unit)
            .bind(record.multi_buy_quantity)
            .bind(record.multi_buy_price)
            .bind(record.multi_buy_price_per_unit)
            .bind(record.scraped_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_latest_prices_for_scraper(
        &self,
        product_scraper_id: i64,
    ) -> PricewatchResult<Vec<PriceRecord>> {
        // 最近一个抓取时间戳下的整批记录
        let rows = sqlx::query(
            r#"
            SELECT * FROM price_records
            WHERE product_scraper_id = ?
              AND scraped_at = (
                  SELECT MAX(scraped_at) FROM price_records WHERE product_scraper_id = ?
              )
            ORDER BY id
            "#,
        )
        .bind(product_scraper_id)
        .bind(product_scraper_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::map_record).collect()
    }
}
