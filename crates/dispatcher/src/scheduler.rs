//! 周期调度器
//!
//! 两个独立的循环定时器，都只是队列的触发器，自身几乎无状态：
//! - 到期抓取器定时器（默认60秒，进程启动时立即执行一次）：
//!   查询所有到期的启用抓取器并批量入队
//! - 档位刷新定时器（慢周期，默认12小时）：为在用汇率档位入队
//!   刷新任务，顺带清理过期运行记录
//!
//! 定时器重叠无需处理：入队在队列层去重，慢批次不会因为定时器
//! 再次触发而产生重复调度。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use pricewatch_core::config::SchedulerConfig;
use pricewatch_core::errors::PricewatchResult;
use pricewatch_core::models::JobSource;
use pricewatch_core::traits::{ProductScraperRepository, ScraperRunRepository, TierRefreshService};

use crate::queue::ScrapeQueue;

pub struct ScrapeScheduler {
    queue: Arc<ScrapeQueue>,
    scrapers: Arc<dyn ProductScraperRepository>,
    runs: Arc<dyn ScraperRunRepository>,
    tiers: Arc<dyn TierRefreshService>,
    config: SchedulerConfig,
    /// 连续轮询失败计数，观测用
    poll_errors: AtomicU64,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ScrapeScheduler {
    pub fn new(
        queue: Arc<ScrapeQueue>,
        scrapers: Arc<dyn ProductScraperRepository>,
        runs: Arc<dyn ScraperRunRepository>,
        tiers: Arc<dyn TierRefreshService>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            scrapers,
            runs,
            tiers,
            config,
            poll_errors: AtomicU64::new(0),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// 启动两个定时器任务
    pub fn start(self: &Arc<Self>) {
        let poll_period = Duration::from_secs(self.config.poll_interval_seconds);
        let tier_period = Duration::from_secs(self.config.tier_refresh_interval_seconds);

        let scheduler = Arc::clone(self);
        let due_handle = tokio::spawn(async move {
            // 第一次tick立即触发：进程启动即检查到期工作
            let mut ticker = tokio::time::interval(poll_period);
            loop {
                ticker.tick().await;
                match scheduler.poll_due_once().await {
                    Ok(enqueued) => {
                        scheduler.poll_errors.store(0, Ordering::Relaxed);
                        if enqueued > 0 {
                            info!("调度器入队了 {enqueued} 个到期抓取任务");
                        }
                    }
                    Err(e) => {
                        scheduler.poll_errors.fetch_add(1, Ordering::Relaxed);
                        error!("到期抓取器轮询失败: {e}");
                    }
                }
            }
        });

        let scheduler = Arc::clone(self);
        let tier_handle = tokio::spawn(async move {
            // 慢定时器不需要启动时立即触发
            let start = tokio::time::Instant::now() + tier_period;
            let mut ticker = tokio::time::interval_at(start, tier_period);
            loop {
                ticker.tick().await;
                scheduler.tier_tick().await;
            }
        });

        let mut handles = self.handles.lock().unwrap();
        handles.push(due_handle);
        handles.push(tier_handle);
        info!(
            "调度器已启动 (轮询{}秒, 档位刷新{}秒)",
            self.config.poll_interval_seconds, self.config.tier_refresh_interval_seconds
        );
    }

    /// 单次到期轮询：查到期抓取器并批量入队，返回实际入队数。
    /// 队列层去重保证重复轮询不会堆积重复任务。
    pub async fn poll_due_once(&self) -> PricewatchResult<usize> {
        let due = self.scrapers.get_scrapers_needing_run().await?;
        if due.is_empty() {
            return Ok(0);
        }
        debug!("{} 个抓取器到期", due.len());
        let enqueued = self.queue.enqueue_batch(&due, JobSource::Scheduled);
        Ok(enqueued.len())
    }

    /// 慢定时器tick：档位刷新入队 + 运行记录清理
    pub async fn tier_tick(&self) {
        match self.tiers.watched_tiers().await {
            Ok(tiers) => {
                for tier_id in tiers {
                    if self.queue.enqueue_tier_refresh(&tier_id).is_some() {
                        debug!("档位 {tier_id} 刷新任务已入队");
                    }
                }
            }
            Err(e) => error!("读取在用档位失败: {e}"),
        }

        match self.runs.cleanup_old_runs(self.config.run_retention_days).await {
            Ok(0) => {}
            Ok(deleted) => info!("清理了 {deleted} 条过期运行记录"),
            Err(e) => error!("运行记录清理失败: {e}"),
        }
    }

    pub fn poll_error_count(&self) -> u64 {
        self.poll_errors.load(Ordering::Relaxed)
    }

    /// 停止全部定时器
    pub fn shutdown(&self) {
        for handle in self.handles.lock().unwrap().drain(..) {
            handle.abort();
        }
        info!("调度器已停止");
    }
}
