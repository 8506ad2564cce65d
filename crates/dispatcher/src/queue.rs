//! 限速抓取队列
//!
//! 单worker、FIFO、相邻两次任务启动至少间隔 interval_ms 的
//! 内存队列。低并发加大间隔是对第三方站点与付费API的礼貌性
//! 反探测设计常量，不是性能瓶颈。
//!
//! 核心不变量：非手动来源的任务按去重键扫描当前等待中+执行中
//! 的任务，已存在则不重复入队。调度器因此可以安全地重复触发，
//! 慢任务不会导致重复工作堆积。手动触发总是入队。
//!
//! 任务状态只存活于进程内；重启后由调度器的到期查询重建。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use pricewatch_core::errors::{PricewatchError, PricewatchResult};
use pricewatch_core::models::{JobKind, JobSource, JobStatus, ProductScraper, QueueJob, RunLog};
use pricewatch_core::settings::RuntimeSettings;
use pricewatch_core::traits::{ProductScraperRepository, ScrapeExecutor, TierRefreshService};

/// 队列状态变化事件，推送给订阅者驱动实时观察
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    JobAdded(QueueJob),
    JobStarted(QueueJob),
    JobCompleted(QueueJob),
    Paused,
    Resumed,
    Cleared,
}

/// 队列状态的时点快照
#[derive(Debug, Clone, Serialize)]
pub struct QueueStateSnapshot {
    pub items: Vec<QueueJob>,
    pub pending_count: usize,
    pub running_count: usize,
    pub is_processing: bool,
    pub is_paused: bool,
    pub processed_count: u64,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub interval_ms: u64,
    /// 有任务等待且无任务执行中时的下次启动估计
    pub estimated_next_run_at: Option<DateTime<Utc>>,
}

type ListenerFn = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

struct QueueState {
    /// 全部被追踪的任务（等待/执行/终态保留）
    jobs: HashMap<String, QueueJob>,
    /// 等待执行的任务id（FIFO）
    pending: VecDeque<String>,
    /// 任务插入顺序，用于展示与终态淘汰
    order: Vec<String>,
    running: Option<String>,
    paused: bool,
    processed_count: u64,
    last_processed_at: Option<DateTime<Utc>>,
    /// 上次任务启动时刻，节流判定基准
    last_started: Option<tokio::time::Instant>,
    interval_ms: u64,
    history_limit: usize,
}

impl QueueState {
    /// 距离允许启动下一个任务还需等待的时长
    fn throttle_remaining(&self) -> Option<Duration> {
        let last = self.last_started?;
        let interval = Duration::from_millis(self.interval_ms);
        let elapsed = last.elapsed();
        if elapsed >= interval {
            None
        } else {
            Some(interval - elapsed)
        }
    }

    /// 淘汰最老的终态任务，保留条数不超过上限
    fn evict_terminal(&mut self) {
        let mut terminal = self
            .order
            .iter()
            .filter(|id| self.jobs.get(*id).map(|j| j.is_terminal()).unwrap_or(false))
            .count();
        let mut i = 0;
        while terminal > self.history_limit && i < self.order.len() {
            let id = self.order[i].clone();
            if self.jobs.get(&id).map(|j| j.is_terminal()).unwrap_or(false) {
                self.order.remove(i);
                self.jobs.remove(&id);
                terminal -= 1;
            } else {
                i += 1;
            }
        }
    }
}

/// 限速抓取队列
///
/// 由组合根显式构造并注入依赖；测试各自实例化隔离的队列，
/// 不存在进程级单例。
pub struct ScrapeQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    listeners: Mutex<HashMap<String, ListenerFn>>,
    scrapers: Arc<dyn ProductScraperRepository>,
    executor: Arc<dyn ScrapeExecutor>,
    tiers: Arc<dyn TierRefreshService>,
    shutting_down: AtomicBool,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ScrapeQueue {
    pub fn new(
        settings: &RuntimeSettings,
        scrapers: Arc<dyn ProductScraperRepository>,
        executor: Arc<dyn ScrapeExecutor>,
        tiers: Arc<dyn TierRefreshService>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState {
                jobs: HashMap::new(),
                pending: VecDeque::new(),
                order: Vec::new(),
                running: None,
                paused: false,
                processed_count: 0,
                last_processed_at: None,
                last_started: None,
                interval_ms: settings.queue_interval_ms,
                history_limit: settings.queue_history_limit,
            }),
            notify: Notify::new(),
            listeners: Mutex::new(HashMap::new()),
            scrapers,
            executor,
            tiers,
            shutting_down: AtomicBool::new(false),
            worker_handle: Mutex::new(None),
        })
    }

    /// 启动队列worker
    pub fn start(self: &Arc<Self>) {
        let queue = Arc::clone(self);
        let handle = tokio::spawn(async move { queue.run_worker().await });
        *self.worker_handle.lock().unwrap() = Some(handle);
        info!("抓取队列worker已启动");
    }

    /// 停止worker：等待执行中的任务完成，不再拉取新任务
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.notify.notify_one();
        let handle = self.worker_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("队列worker退出异常: {e}");
            }
        }
        info!("抓取队列已停止");
    }

    /// 为抓取器入队一个任务
    ///
    /// 非手动来源先按目标去重：同一抓取器已有等待中或执行中的
    /// 任务则返回None。手动触发绕过去重，总是产生新任务。
    pub fn enqueue_scraper(
        &self,
        scraper: &ProductScraper,
        source: JobSource,
    ) -> Option<QueueJob> {
        let job = QueueJob::scrape(scraper, source);
        self.enqueue_job(job, source == JobSource::Manual)
    }

    /// 批量入队，逐个应用去重规则，返回实际创建的任务
    pub fn enqueue_batch(
        &self,
        scrapers: &[ProductScraper],
        source: JobSource,
    ) -> Vec<QueueJob> {
        scrapers
            .iter()
            .filter_map(|scraper| self.enqueue_scraper(scraper, source))
            .collect()
    }

    /// 为汇率档位入队刷新任务（始终去重）
    pub fn enqueue_tier_refresh(&self, tier_id: &str) -> Option<QueueJob> {
        self.enqueue_job(QueueJob::tier_refresh(tier_id), false)
    }

    fn enqueue_job(&self, job: QueueJob, bypass_dedup: bool) -> Option<QueueJob> {
        {
            let mut state = self.state.lock().unwrap();
            if !bypass_dedup {
                let key = job.kind.dedup_key();
                let duplicate = state
                    .jobs
                    .values()
                    .any(|j| j.is_outstanding() && j.kind.dedup_key() == key);
                if duplicate {
                    return None;
                }
            }
            state.jobs.insert(job.id.clone(), job.clone());
            state.pending.push_back(job.id.clone());
            state.order.push(job.id.clone());
        }
        self.emit(&QueueEvent::JobAdded(job.clone()));
        self.notify.notify_one();
        Some(job)
    }

    /// 暂停worker拉取新任务，已入队任务保留
    pub fn pause(&self) {
        self.state.lock().unwrap().paused = true;
        self.emit(&QueueEvent::Paused);
        info!("抓取队列已暂停");
    }

    pub fn resume(&self) {
        self.state.lock().unwrap().paused = false;
        self.emit(&QueueEvent::Resumed);
        self.notify.notify_one();
        info!("抓取队列已恢复");
    }

    /// 丢弃所有等待中的任务（不影响执行中的）
    pub fn clear(&self) {
        {
            let mut state = self.state.lock().unwrap();
            let pending: Vec<String> = state.pending.drain(..).collect();
            for id in pending {
                state.jobs.remove(&id);
                state.order.retain(|o| o != &id);
            }
        }
        self.emit(&QueueEvent::Cleared);
        info!("抓取队列已清空等待任务");
    }

    /// 修改节流间隔，仅在队列完全空闲时允许
    ///
    /// 执行中途改间隔会产生歧义的计时语义，直接拒绝。
    pub fn set_interval(&self, interval_ms: u64) -> PricewatchResult<()> {
        if interval_ms == 0 {
            return Err(PricewatchError::Configuration(
                "队列间隔必须大于0".to_string(),
            ));
        }
        let mut state = self.state.lock().unwrap();
        if !state.pending.is_empty() || state.running.is_some() {
            return Err(PricewatchError::QueueBusy(format!(
                "队列非空闲 ({}个等待, {}个执行中), 拒绝修改间隔",
                state.pending.len(),
                usize::from(state.running.is_some())
            )));
        }
        state.interval_ms = interval_ms;
        info!("队列间隔已调整为 {interval_ms}ms");
        Ok(())
    }

    /// 时点快照
    pub fn get_state(&self) -> QueueStateSnapshot {
        let state = self.state.lock().unwrap();
        let items: Vec<QueueJob> = state
            .order
            .iter()
            .filter_map(|id| state.jobs.get(id).cloned())
            .collect();
        let pending_count = state.pending.len();
        let is_processing = state.running.is_some();
        let estimated_next_run_at = if pending_count > 0 && !is_processing {
            state
                .last_processed_at
                .map(|at| at + chrono::Duration::milliseconds(state.interval_ms as i64))
        } else {
            None
        };
        QueueStateSnapshot {
            items,
            pending_count,
            running_count: usize::from(is_processing),
            is_processing,
            is_paused: state.paused,
            processed_count: state.processed_count,
            last_processed_at: state.last_processed_at,
            interval_ms: state.interval_ms,
            estimated_next_run_at,
        }
    }

    /// 注册状态监听器；同id重复注册为替换
    pub fn subscribe(&self, listener_id: &str, listener: impl Fn(&QueueEvent) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap()
            .insert(listener_id.to_string(), Arc::new(listener));
    }

    pub fn unsubscribe(&self, listener_id: &str) {
        self.listeners.lock().unwrap().remove(listener_id);
    }

    /// 向全部订阅者推送事件，逐个隔离panic：
    /// 一个坏订阅者不能影响其他订阅者或worker
    fn emit(&self, event: &QueueEvent) {
        let listeners: Vec<(String, ListenerFn)> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(id, l)| (id.clone(), Arc::clone(l)))
            .collect();
        for (id, listener) in listeners {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(event);
            }));
            if result.is_err() {
                warn!("队列监听器 {id} 发生panic, 已隔离");
            }
        }
    }

    /// worker主循环：取任务 → 节流 → 执行 → 记账，一次一个
    async fn run_worker(self: Arc<Self>) {
        enum Step {
            Run(QueueJob),
            Sleep(Duration),
            Idle,
        }

        loop {
            let job = loop {
                if self.shutting_down.load(Ordering::SeqCst) {
                    return;
                }
                let step = {
                    let mut state = self.state.lock().unwrap();
                    if state.paused || state.pending.is_empty() {
                        Step::Idle
                    } else if let Some(wait) = state.throttle_remaining() {
                        Step::Sleep(wait)
                    } else {
                        // 节流允许启动：弹出队首并标记执行中
                        let id = match state.pending.pop_front() {
                            Some(id) => id,
                            None => continue,
                        };
                        state.last_started = Some(tokio::time::Instant::now());
                        state.running = Some(id.clone());
                        match state.jobs.get_mut(&id) {
                            Some(job) => {
                                job.mark_started();
                                Step::Run(job.clone())
                            }
                            None => {
                                state.running = None;
                                continue;
                            }
                        }
                    }
                };
                match step {
                    Step::Run(job) => break job,
                    Step::Sleep(wait) => {
                        tokio::select! {
                            _ = tokio::time::sleep(wait) => {}
                            _ = self.notify.notified() => {}
                        }
                    }
                    Step::Idle => self.notify.notified().await,
                }
            };

            self.emit(&QueueEvent::JobStarted(job.clone()));
            let (status, error) = self.process_job(&job).await;

            let completed = {
                let mut state = self.state.lock().unwrap();
                state.running = None;
                state.processed_count += 1;
                state.last_processed_at = Some(Utc::now());
                let completed = match state.jobs.get_mut(&job.id) {
                    Some(tracked) => {
                        tracked.mark_completed(status, error);
                        tracked.clone()
                    }
                    None => job.clone(),
                };
                state.evict_terminal();
                completed
            };
            self.emit(&QueueEvent::JobCompleted(completed));
        }
    }

    /// 执行单个任务，返回终态与错误文本。
    /// 意外错误（持久化不可用等）记日志并继续下一个任务，
    /// 绝不终止worker。
    async fn process_job(&self, job: &QueueJob) -> (JobStatus, Option<String>) {
        match &job.kind {
            JobKind::Scrape { product_scraper_id } => {
                // 执行时重新取最新状态：入队之后的编辑在这里生效
                let scraper = match self.scrapers.get_by_id(*product_scraper_id).await {
                    Ok(Some(scraper)) => scraper,
                    Ok(None) => {
                        warn!("任务 {} 的抓取器 {product_scraper_id} 已不存在", job.id);
                        return (JobStatus::Error, Some("抓取器已被删除".to_string()));
                    }
                    Err(e) => {
                        error!("读取抓取器 {product_scraper_id} 失败: {e}");
                        return (JobStatus::Error, Some(e.to_string()));
                    }
                };

                let outcome = match self
                    .executor
                    .execute(&scraper, job.source.forces_refresh(), RunLog::new())
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("任务 {} 执行出现意外错误: {e}", job.id);
                        return (JobStatus::Error, Some(e.to_string()));
                    }
                };

                // mark失败时到期时间不前进，下个周期重试（故障开放）
                if let Err(e) = self
                    .scrapers
                    .mark_as_run(scraper.id, outcome.status, outcome.error_message.as_deref())
                    .await
                {
                    error!("抓取器 {} mark_as_run 失败: {e}", scraper.id);
                }

                (JobStatus::from_outcome(outcome.status), outcome.error_message)
            }
            JobKind::TierRefresh { tier_id } => match self.tiers.refresh(tier_id).await {
                Ok(()) => (JobStatus::Success, None),
                Err(e) => {
                    warn!("档位 {tier_id} 刷新失败: {e}");
                    (JobStatus::Error, Some(e.to_string()))
                }
            },
        }
    }
}
