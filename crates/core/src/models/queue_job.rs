use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::product_scraper::ProductScraper;
use super::scraper_run::ScrapeStatus;

/// 队列任务负载
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    /// 抓取某个价格抓取器
    Scrape { product_scraper_id: i64 },
    /// 刷新某个汇率档位
    TierRefresh { tier_id: String },
}

impl JobKind {
    /// 去重键：同一目标在队列中最多有一个未完成任务（手动触发除外）
    pub fn dedup_key(&self) -> String {
        match self {
            JobKind::Scrape { product_scraper_id } => format!("scrape:{product_scraper_id}"),
            JobKind::TierRefresh { tier_id } => format!("tier:{tier_id}"),
        }
    }
}

/// 任务来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobSource {
    /// 用户手动触发，绕过去重，总是强制刷新
    #[serde(rename = "MANUAL")]
    Manual,
    /// 周期调度器触发，遵守缓存窗口
    #[serde(rename = "SCHEDULED")]
    Scheduled,
    /// 商品组批量触发，强制刷新
    #[serde(rename = "GROUP")]
    Group,
}

impl JobSource {
    /// 手动与批量触发都要求绕过缓存直接访问网络
    pub fn forces_refresh(&self) -> bool {
        !matches!(self, JobSource::Scheduled)
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "WARNING")]
    Warning,
    #[serde(rename = "ERROR")]
    Error,
}

impl JobStatus {
    /// 由执行结果映射任务终态；缓存命中对队列而言是成功
    pub fn from_outcome(status: ScrapeStatus) -> Self {
        match status {
            ScrapeStatus::Success | ScrapeStatus::Cached => JobStatus::Success,
            ScrapeStatus::Warning => JobStatus::Warning,
            ScrapeStatus::Error => JobStatus::Error,
        }
    }
}

/// 内存队列任务
///
/// 仅存活于进程内，不落库；进程重启后由调度器的到期查询重建。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    pub id: String,
    pub kind: JobKind,
    /// 展示用标签（商品/URL摘要或档位名）
    pub label: String,
    pub source: JobSource,
    pub status: JobStatus,
    pub error: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QueueJob {
    /// 为抓取器创建待执行任务
    pub fn scrape(scraper: &ProductScraper, source: JobSource) -> Self {
        let label = match scraper.url_domain() {
            Some(domain) => format!("商品{} @ {domain}", scraper.product_id),
            None => format!("商品{} @ {}", scraper.product_id, scraper.url),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: JobKind::Scrape {
                product_scraper_id: scraper.id,
            },
            label,
            source,
            status: JobStatus::Pending,
            error: None,
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// 为汇率档位创建刷新任务
    pub fn tier_refresh(tier_id: impl Into<String>) -> Self {
        let tier_id = tier_id.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: JobKind::TierRefresh {
                tier_id: tier_id.clone(),
            },
            label: format!("汇率刷新 {tier_id}"),
            source: JobSource::Scheduled,
            status: JobStatus::Pending,
            error: None,
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Success | JobStatus::Warning | JobStatus::Error
        )
    }

    /// 未完成（等待中或执行中），参与去重扫描
    pub fn is_outstanding(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Running)
    }

    pub fn mark_started(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, status: JobStatus, error: Option<String>) {
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product_scraper::ScraperType;

    #[test]
    fn test_dedup_key_distinguishes_kinds() {
        let scrape = JobKind::Scrape {
            product_scraper_id: 7,
        };
        let tier = JobKind::TierRefresh {
            tier_id: "USD".to_string(),
        };
        assert_ne!(scrape.dedup_key(), tier.dedup_key());
        assert_eq!(scrape.dedup_key(), "scrape:7");
    }

    #[test]
    fn test_source_force_semantics() {
        assert!(JobSource::Manual.forces_refresh());
        assert!(JobSource::Group.forces_refresh());
        assert!(!JobSource::Scheduled.forces_refresh());
    }

    #[test]
    fn test_cached_outcome_maps_to_success() {
        assert_eq!(
            JobStatus::from_outcome(ScrapeStatus::Cached),
            JobStatus::Success
        );
        assert_eq!(
            JobStatus::from_outcome(ScrapeStatus::Warning),
            JobStatus::Warning
        );
    }

    #[test]
    fn test_job_lifecycle_transitions() {
        let scraper = ProductScraper::new(
            3,
            ScraperType::StaticHtml,
            "https://shop.example.com/item".to_string(),
        );
        let mut job = QueueJob::scrape(&scraper, JobSource::Scheduled);
        assert!(job.is_outstanding());

        job.mark_started();
        assert!(job.is_outstanding());
        assert!(job.started_at.is_some());

        job.mark_completed(JobStatus::Success, None);
        assert!(job.is_terminal());
        assert!(job.completed_at.is_some());
    }
}
