use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 单次抓取执行的结果状态
///
/// - `Success`: 至少持久化了一条价格
/// - `Warning`: 策略成功但未找到任何价格（可能是暂时性的提取缺口）
/// - `Error`: 策略失败（网络错误、解析失败、所有回退层级耗尽）
/// - `Cached`: 缓存窗口内跳过了实际抓取，重放了上次的价格
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScrapeStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "WARNING")]
    Warning,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "CACHED")]
    Cached,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Success => "SUCCESS",
            ScrapeStatus::Warning => "WARNING",
            ScrapeStatus::Error => "ERROR",
            ScrapeStatus::Cached => "CACHED",
        }
    }
}

impl std::fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Sqlite> for ScrapeStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ScrapeStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "SUCCESS" => Ok(ScrapeStatus::Success),
            "WARNING" => Ok(ScrapeStatus::Warning),
            "ERROR" => Ok(ScrapeStatus::Error),
            "CACHED" => Ok(ScrapeStatus::Cached),
            _ => Err(format!("Invalid scrape status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ScrapeStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 抓取执行记录
///
/// 每次执行尝试恰好产生一条记录，创建后不再修改（追加式运行日志）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperRun {
    pub id: i64,
    pub product_scraper_id: i64,
    pub status: ScrapeStatus,
    pub prices_found: i64,
    pub prices_saved: i64,
    pub error_message: Option<String>,
    /// 换行拼接的执行日志行
    pub log: String,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl ScraperRun {
    pub fn new(product_scraper_id: i64, status: ScrapeStatus) -> Self {
        Self {
            id: 0, // 将由数据库生成
            product_scraper_id,
            status,
            prices_found: 0,
            prices_saved: 0,
            error_message: None,
            log: String::new(),
            duration_ms: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.status, ScrapeStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [
            ScrapeStatus::Success,
            ScrapeStatus::Warning,
            ScrapeStatus::Error,
            ScrapeStatus::Cached,
        ] {
            let s = serde_json::to_string(&status).unwrap();
            let back: ScrapeStatus = serde_json::from_str(&s).unwrap();
            assert_eq!(status, back);
        }
    }

    #[test]
    fn test_only_success_counts_as_successful() {
        assert!(ScraperRun::new(1, ScrapeStatus::Success).is_successful());
        assert!(!ScraperRun::new(1, ScrapeStatus::Cached).is_successful());
        assert!(!ScraperRun::new(1, ScrapeStatus::Warning).is_successful());
    }
}
