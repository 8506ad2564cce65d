use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scraper_run::ScrapeStatus;

/// 价格抓取器定义
///
/// 表示一个被持续追踪的 (商品, 零售商URL, 抓取策略) 三元组，
/// 按固定的分钟间隔周期性抓取。
///
/// # 字段说明
///
/// - `id`: 抓取器的唯一标识符
/// - `product_id`: 所属商品的标识符
/// - `scraper_type`: 抓取策略类型（静态HTML / 第三方提取API / 本地LLM）
/// - `url`: 零售商商品页面URL
/// - `scrape_hints`: 可选的自由文本提示，辅助策略定位价格
/// - `interval_minutes`: 抓取间隔（分钟）
/// - `enabled`: 是否启用（软停用而非删除）
/// - `last_scraped_at`: 最近一次执行时间，调度到期计算的唯一依据
/// - `last_scrape_status`: 最近一次执行状态
/// - `last_scrape_error`: 最近一次执行的错误文本
/// - `issue_dismissed_at`: 问题视图的忽略时间戳
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductScraper {
    pub id: i64,
    pub product_id: i64,
    pub scraper_type: ScraperType,
    pub url: String,
    pub scrape_hints: Option<String>,
    pub interval_minutes: i64,
    pub enabled: bool,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub last_scrape_status: Option<ScrapeStatus>,
    pub last_scrape_error: Option<String>,
    pub issue_dismissed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 抓取策略类型
///
/// 封闭枚举：每个变体对应一个策略实现，按变体整体分发，
/// 不存在字符串键查找失败的情况。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScraperType {
    /// 静态HTML解析（直接抓取 + 结构化数据/正则提取）
    #[serde(rename = "STATIC_HTML")]
    StaticHtml,
    /// 第三方提取API（带渲染/反爬回退层级）
    #[serde(rename = "EXTRACTION_API")]
    ExtractionApi,
    /// 本地LLM推理提取
    #[serde(rename = "LOCAL_LLM")]
    LocalLlm,
}

impl ScraperType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScraperType::StaticHtml => "STATIC_HTML",
            ScraperType::ExtractionApi => "EXTRACTION_API",
            ScraperType::LocalLlm => "LOCAL_LLM",
        }
    }
}

impl std::fmt::Display for ScraperType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Sqlite> for ScraperType {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ScraperType {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "STATIC_HTML" => Ok(ScraperType::StaticHtml),
            "EXTRACTION_API" => Ok(ScraperType::ExtractionApi),
            "LOCAL_LLM" => Ok(ScraperType::LocalLlm),
            _ => Err(format!("Invalid scraper type: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ScraperType {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

impl ProductScraper {
    /// 创建新的抓取器
    pub fn new(product_id: i64, scraper_type: ScraperType, url: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // 将由数据库生成
            product_id,
            scraper_type,
            url,
            scrape_hints: None,
            interval_minutes: 1440, // 默认每天一次
            enabled: true,
            last_scraped_at: None,
            last_scrape_status: None,
            last_scrape_error: None,
            issue_dismissed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 检查抓取器是否已到期需要执行
    ///
    /// 从未执行过的抓取器视为立即到期。mark_as_run 失败时
    /// last_scraped_at 不前进，下个调度周期会再次选中（故障开放）。
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last_scraped_at {
            None => true,
            Some(last) => now >= last + chrono::Duration::minutes(self.interval_minutes),
        }
    }

    /// 检查抓取器是否应出现在问题视图中
    ///
    /// 错误、警告或从未执行过都算问题；被忽略过的问题
    /// 只有在忽略时间之后又执行过才会重新出现。
    pub fn has_issue(&self) -> bool {
        let problematic = match (self.last_scraped_at, self.last_scrape_status) {
            (None, _) => true,
            (Some(_), Some(ScrapeStatus::Error)) | (Some(_), Some(ScrapeStatus::Warning)) => true,
            _ => false,
        };
        if !problematic {
            return false;
        }
        match (self.issue_dismissed_at, self.last_scraped_at) {
            (Some(dismissed), Some(last)) => last > dismissed,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// 页面所属域名（去掉 www. 前缀），用作默认零售商名
    pub fn url_domain(&self) -> Option<String> {
        let rest = self.url.split("//").nth(1)?;
        let host = rest.split('/').next()?;
        Some(host.trim_start_matches("www.").to_string())
    }
}
