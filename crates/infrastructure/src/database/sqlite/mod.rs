//! 嵌入式SQLite数据库
//!
//! 连接池构建与内嵌迁移。自托管部署场景：单文件数据库、
//! WAL模式、启用外键约束。

pub mod price_repository;
pub mod run_repository;
pub mod scraper_repository;
pub mod settings_repository;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use pricewatch_core::config::DatabaseConfig;
use pricewatch_core::errors::PricewatchResult;

pub use price_repository::SqlitePriceRepository;
pub use run_repository::SqliteRunRepository;
pub use scraper_repository::SqliteScraperRepository;
pub use settings_repository::SqliteSettingsRepository;

/// SQLite数据库句柄：构建连接池并执行迁移
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// 按配置连接数据库，不存在则创建
    pub async fn connect(config: &DatabaseConfig) -> PricewatchResult<Self> {
        debug!("连接SQLite数据库: {}", config.url);
        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_with(connect_options)
            .await?;

        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// 内存数据库（测试用）。内存库按连接隔离，连接池必须收敛到1
    pub async fn connect_in_memory() -> PricewatchResult<Self> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }
}

/// 执行数据库迁移
async fn run_migrations(pool: &SqlitePool) -> PricewatchResult<()> {
    debug!("执行SQLite数据库迁移");

    // 抓取器表
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_scrapers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL,
            scraper_type TEXT NOT NULL,
            url TEXT NOT NULL,
            scrape_hints TEXT,
            interval_minutes INTEGER NOT NULL DEFAULT 1440,
            enabled INTEGER NOT NULL DEFAULT 1,
            last_scraped_at TEXT,
            last_scrape_status TEXT,
            last_scrape_error TEXT,
            issue_dismissed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 零售商表
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS retailers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            domain TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 价格历史表（追加式，不更新）
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS price_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_scraper_id INTEGER NOT NULL,
            retailer_id INTEGER NOT NULL,
            price REAL NOT NULL,
            currency TEXT NOT NULL,
            in_stock INTEGER NOT NULL DEFAULT 1,
            availability TEXT,
            product_url TEXT,
            unit_count REAL,
            unit_type TEXT,
            price_per_unit REAL,
            multi_buy_quantity INTEGER,
            multi_buy_price REAL,
            multi_buy_price_per_unit REAL,
            scraped_at TEXT NOT NULL,
            FOREIGN KEY (product_scraper_id) REFERENCES product_scrapers(id) ON DELETE CASCADE,
            FOREIGN KEY (retailer_id) REFERENCES retailers(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_price_records_scraper_time \
         ON price_records(product_scraper_id, scraped_at)",
    )
    .execute(pool)
    .await?;

    // 运行记录表（追加式）
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scraper_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_scraper_id INTEGER NOT NULL,
            status TEXT NOT NULL,
            prices_found INTEGER NOT NULL DEFAULT 0,
            prices_saved INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            log TEXT NOT NULL DEFAULT '',
            duration_ms INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (product_scraper_id) REFERENCES product_scrapers(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_scraper_runs_scraper \
         ON scraper_runs(product_scraper_id, created_at)",
    )
    .execute(pool)
    .await?;

    // 运行期设置表
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    debug!("SQLite迁移完成");
    Ok(())
}
