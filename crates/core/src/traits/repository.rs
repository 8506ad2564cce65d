//! 数据仓储层接口定义
//!
//! 此模块定义了数据持久化层的核心抽象接口，包括：
//! - 抓取器仓储接口 (ProductScraperRepository)
//! - 运行记录仓储接口 (ScraperRunRepository)
//! - 价格仓储接口 (PriceRepository)
//! - 运行期设置仓储接口 (SettingsRepository)
//!
//! ## 设计原则
//!
//! 接口与具体实现分离：生产环境为SQLite实现，测试使用内存实现。
//! 所有操作均为异步，返回 `PricewatchResult<T>` 统一错误处理，
//! 并实现 `Send + Sync` 确保可在队列worker与API处理器之间共享。
//!
//! 持久化层被视为事务性的记录存储；价格历史与运行记录都是
//! 追加式的，仓储接口不提供对它们的更新操作。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::PricewatchResult;
use crate::models::{PriceRecord, ProductScraper, Retailer, ScrapeStatus, ScraperRun};

/// 抓取器仓储接口
#[async_trait]
pub trait ProductScraperRepository: Send + Sync {
    /// 创建抓取器，返回带数据库生成id的副本
    async fn create(&self, scraper: &ProductScraper) -> PricewatchResult<ProductScraper>;

    /// 按id查询抓取器
    async fn get_by_id(&self, id: i64) -> PricewatchResult<Option<ProductScraper>>;

    /// 查询某商品下的全部抓取器（批量触发用）
    async fn get_by_product_id(&self, product_id: i64) -> PricewatchResult<Vec<ProductScraper>>;

    /// 更新抓取器配置
    async fn update(&self, scraper: &ProductScraper) -> PricewatchResult<()>;

    /// 查询所有已到期的启用抓取器：
    /// `now >= last_scraped_at + interval_minutes`，或从未执行过
    async fn get_scrapers_needing_run(&self) -> PricewatchResult<Vec<ProductScraper>>;

    /// 记录一次执行完成：更新 last_scraped_at / last_scrape_status /
    /// last_scrape_error。这是调度到期计算前进的唯一机制。
    async fn mark_as_run(
        &self,
        id: i64,
        status: ScrapeStatus,
        error: Option<&str>,
    ) -> PricewatchResult<()>;

    /// 问题视图：最近状态为错误/警告或从未执行过的抓取器，
    /// 排除已忽略且其后未再执行的
    async fn get_scrapers_with_issues(&self) -> PricewatchResult<Vec<ProductScraper>>;

    /// 忽略某抓取器当前的问题
    async fn dismiss_issue(&self, id: i64, dismissed_at: DateTime<Utc>) -> PricewatchResult<()>;
}

/// 运行记录仓储接口（追加式）
#[async_trait]
pub trait ScraperRunRepository: Send + Sync {
    /// 持久化一条运行记录，返回带数据库生成id的副本
    async fn create(&self, run: &ScraperRun) -> PricewatchResult<ScraperRun>;

    /// 按id查询运行记录
    async fn get_by_id(&self, id: i64) -> PricewatchResult<Option<ScraperRun>>;

    /// 最近一次状态为SUCCESS的运行，缓存窗口计算的依据。
    /// warning/cached 不计入（只有真正的成功才推进缓存时钟）。
    async fn get_last_successful_run(
        &self,
        product_scraper_id: i64,
    ) -> PricewatchResult<Option<ScraperRun>>;

    /// 最近的若干条运行记录，新的在前
    async fn get_recent_runs(
        &self,
        product_scraper_id: i64,
        limit: i64,
    ) -> PricewatchResult<Vec<ScraperRun>>;

    /// 清理超过保留天数的运行记录，返回删除条数
    async fn cleanup_old_runs(&self, days: i32) -> PricewatchResult<u64>;
}

/// 价格仓储接口
#[async_trait]
pub trait PriceRepository: Send + Sync {
    /// 按名称查找零售商，不存在则创建
    async fn get_or_create_retailer(
        &self,
        name: &str,
        domain: Option<&str>,
    ) -> PricewatchResult<Retailer>;

    /// 批量追加价格记录
    async fn create_price_records(&self, records: &[PriceRecord]) -> PricewatchResult<()>;

    /// 某抓取器最近一批价格记录（最近一个时间戳下的全部行），
    /// 缓存重放的数据源
    async fn get_latest_prices_for_scraper(
        &self,
        product_scraper_id: i64,
    ) -> PricewatchResult<Vec<PriceRecord>>;
}

/// 运行期设置仓储接口
///
/// 键值存储，承载可在运行期调整的设置（缓存小时数、价格上限、
/// 队列间隔等），键名见 [`crate::config::setting_keys`]。
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> PricewatchResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> PricewatchResult<()>;
}
