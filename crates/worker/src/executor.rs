//! 单次抓取执行编排
//!
//! 对一个抓取器执行一次完整的抓取尝试：调用策略、应用缓存
//! 重放、落库价格、写入运行记录、触发通知检查。策略层面的
//! 失败一律转化为运行结果而不向外抛出；只有持久化不可用这类
//! 意外错误才会越过执行器边界。

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use pricewatch_core::errors::{PricewatchError, PricewatchResult};
use pricewatch_core::models::{PriceRecord, ProductScraper, RunLog, ScrapeStatus, ScraperRun};
use pricewatch_core::traits::{
    NotificationService, PriceRepository, ScrapeContext, ScrapeExecutor, ScraperRunRepository,
};

use crate::strategies::StrategyRegistry;

/// 单次执行的选项
pub struct ExecuteOptions {
    /// 绕过缓存窗口强制访问网络（手动/批量触发）
    pub force: bool,
    pub log: RunLog,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            force: false,
            log: RunLog::new(),
        }
    }
}

/// 抓取执行器
///
/// 不修改抓取器本身（mark_as_run 由调用方负责），因此同一次
/// 执行可以安全重试。
pub struct RunExecutor {
    strategies: StrategyRegistry,
    runs: Arc<dyn ScraperRunRepository>,
    prices: Arc<dyn PriceRepository>,
    notifier: Arc<dyn NotificationService>,
}

impl RunExecutor {
    pub fn new(
        strategies: StrategyRegistry,
        runs: Arc<dyn ScraperRunRepository>,
        prices: Arc<dyn PriceRepository>,
        notifier: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            strategies,
            runs,
            prices,
            notifier,
        }
    }

    /// 执行一次抓取，总是恰好持久化一条运行记录
    pub async fn execute(
        &self,
        scraper: &ProductScraper,
        opts: ExecuteOptions,
    ) -> PricewatchResult<ScraperRun> {
        let started = Instant::now();
        let log = opts.log;

        let last_success = self.runs.get_last_successful_run(scraper.id).await?;
        let strategy = self.strategies.get(scraper.scraper_type);
        log.push(format!(
            "策略 {} 开始执行 (force={})",
            strategy.name(),
            opts.force
        ));

        let ctx = ScrapeContext {
            force_refresh: opts.force,
            last_successful_run_at: last_success.map(|run| run.created_at),
            log: log.clone(),
        };
        let result = strategy
            .scrape(&scraper.url, scraper.scrape_hints.as_deref(), &ctx)
            .await;

        let mut run = match result {
            Err(e) => {
                // 失败原因原样保留给运维可见
                let reason = match e {
                    PricewatchError::ScrapeFailure(reason) => reason,
                    other => other.to_string(),
                };
                log.push(format!("策略失败: {reason}"));
                let mut run = ScraperRun::new(scraper.id, ScrapeStatus::Error);
                run.error_message = Some(reason);
                run
            }
            Ok(output) if output.cached => self.replay_cached(scraper, &log).await?,
            Ok(output) if output.prices.is_empty() => {
                log.push("策略成功但未找到价格".to_string());
                ScraperRun::new(scraper.id, ScrapeStatus::Warning)
            }
            Ok(output) => {
                let now = Utc::now();
                let mut records = Vec::with_capacity(output.prices.len());
                for obs in &output.prices {
                    let retailer = self
                        .prices
                        .get_or_create_retailer(&obs.retailer_name, obs.retailer_domain.as_deref())
                        .await?;
                    records.push(PriceRecord::from_observation(scraper.id, retailer.id, obs, now));
                }
                self.prices.create_price_records(&records).await?;
                log.push(format!("保存 {} 条价格", records.len()));

                let mut run = ScraperRun::new(scraper.id, ScrapeStatus::Success);
                run.prices_found = output.prices.len() as i64;
                run.prices_saved = records.len() as i64;
                run
            }
        };

        // 落库后的通知检查：尽力而为，失败只记日志
        if run.prices_found > 0 {
            if let Err(e) = self.notifier.check_notifications(scraper.product_id).await {
                warn!("商品 {} 的通知检查失败: {e}", scraper.product_id);
                log.push(format!("通知检查失败: {e}"));
            }
        }

        run.duration_ms = started.elapsed().as_millis() as i64;
        run.log = log.serialize();
        let persisted = self.runs.create(&run).await?;

        info!(
            "抓取器 {} 执行完成: {} ({}ms, 找到{}条, 保存{}条)",
            scraper.id, persisted.status, persisted.duration_ms,
            persisted.prices_found, persisted.prices_saved
        );
        Ok(persisted)
    }

    /// 缓存命中：把最近一批价格以新时间戳重新插入，
    /// 保证时间序列视图连续
    async fn replay_cached(
        &self,
        scraper: &ProductScraper,
        log: &RunLog,
    ) -> PricewatchResult<ScraperRun> {
        let latest = self.prices.get_latest_prices_for_scraper(scraper.id).await?;
        let now = Utc::now();
        let replayed: Vec<PriceRecord> = latest.iter().map(|r| r.replayed_at(now)).collect();
        if !replayed.is_empty() {
            self.prices.create_price_records(&replayed).await?;
        }
        log.push(format!("缓存命中: 重放 {} 条价格", replayed.len()));

        let mut run = ScraperRun::new(scraper.id, ScrapeStatus::Cached);
        run.prices_found = replayed.len() as i64;
        run.prices_saved = replayed.len() as i64;
        Ok(run)
    }
}

#[async_trait]
impl ScrapeExecutor for RunExecutor {
    async fn execute(
        &self,
        scraper: &ProductScraper,
        force: bool,
        log: RunLog,
    ) -> PricewatchResult<ScraperRun> {
        RunExecutor::execute(self, scraper, ExecuteOptions { force, log }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricewatch_core::traits::{ScrapeOutput, ScrapeStrategy};
    use pricewatch_testing_utils::{
        MockPriceRepository, MockRunRepository, ObservationBuilder, RecordingNotifier, RunBuilder,
        ScraperBuilder, ScriptedCall, ScriptedStrategy,
    };

    fn executor_with(
        strategy: ScriptedStrategy,
        runs: MockRunRepository,
        prices: MockPriceRepository,
        notifier: RecordingNotifier,
    ) -> RunExecutor {
        // Every variant dispatches to the same scripted strategy; the
        // scrapers in these tests all use StaticHtml.
        let registry = StrategyRegistry::new(
            Box::new(strategy),
            Box::new(ScriptedStrategy::always(Vec::new())),
            Box::new(ScriptedStrategy::always(Vec::new())),
        );
        RunExecutor::new(registry, Arc::new(runs), Arc::new(prices), Arc::new(notifier))
    }

    #[tokio::test]
    async fn test_success_persists_prices_and_notifies() {
        let obs = ObservationBuilder::new().with_price(39.99).build();
        let strategy = ScriptedStrategy::always(vec![obs]);
        let runs = MockRunRepository::new();
        let prices = MockPriceRepository::new();
        let notifier = RecordingNotifier::new();
        let executor = executor_with(strategy, runs.clone(), prices.clone(), notifier.clone());

        let scraper = ScraperBuilder::new().with_id(5).with_product_id(9).build();
        let run = executor
            .execute(&scraper, ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(run.status, ScrapeStatus::Success);
        assert_eq!(run.prices_found, 1);
        assert_eq!(run.prices_saved, 1);
        assert_eq!(prices.record_count(), 1);
        assert_eq!(runs.count(), 1);
        assert_eq!(notifier.checked_product_ids(), vec![9]);
    }

    #[tokio::test]
    async fn test_zero_prices_is_warning_without_notification() {
        let strategy = ScriptedStrategy::always(Vec::new());
        let runs = MockRunRepository::new();
        let prices = MockPriceRepository::new();
        let notifier = RecordingNotifier::new();
        let executor = executor_with(strategy, runs.clone(), prices.clone(), notifier.clone());

        let scraper = ScraperBuilder::new().build();
        let run = executor
            .execute(&scraper, ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(run.status, ScrapeStatus::Warning);
        assert_eq!(run.prices_saved, 0);
        assert_eq!(prices.record_count(), 0);
        assert!(notifier.checked_product_ids().is_empty());
        // The warning still produced exactly one run row.
        assert_eq!(runs.count(), 1);
    }

    #[tokio::test]
    async fn test_strategy_failure_preserves_message_verbatim() {
        let strategy = ScriptedStrategy::new(vec![ScriptedCall::Err("blocked (403)".to_string())]);
        let runs = MockRunRepository::new();
        let prices = MockPriceRepository::new();
        let notifier = RecordingNotifier::new();
        let executor = executor_with(strategy, runs.clone(), prices.clone(), notifier.clone());

        let scraper = ScraperBuilder::new().build();
        let run = executor
            .execute(&scraper, ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(run.status, ScrapeStatus::Error);
        assert_eq!(run.error_message.as_deref(), Some("blocked (403)"));
        assert_eq!(prices.record_count(), 0);
        assert!(notifier.checked_product_ids().is_empty());
        assert_eq!(runs.count(), 1);
    }

    #[tokio::test]
    async fn test_cached_replays_latest_prices_with_fresh_timestamp() {
        let strategy = ScriptedStrategy::new(vec![ScriptedCall::Ok(ScrapeOutput::cached())]);
        let runs = MockRunRepository::new();
        let prices = MockPriceRepository::new();
        let notifier = RecordingNotifier::new();

        // Seed one earlier live batch for scraper 1.
        let scraper = ScraperBuilder::new().with_id(1).build();
        let obs = ObservationBuilder::new().with_price(39.99).build();
        let earlier = Utc::now() - chrono::Duration::hours(2);
        let retailer = prices
            .get_or_create_retailer("Example Store", Some("example.com"))
            .await
            .unwrap();
        prices
            .create_price_records(&[PriceRecord::from_observation(1, retailer.id, &obs, earlier)])
            .await
            .unwrap();

        let executor = executor_with(strategy, runs.clone(), prices.clone(), notifier.clone());
        let run = executor
            .execute(&scraper, ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(run.status, ScrapeStatus::Cached);
        assert_eq!(run.prices_found, 1);
        assert_eq!(run.prices_saved, 1);

        // Total grows by exactly the replayed count, values unchanged.
        let all = prices.get_all_records();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|r| r.price == 39.99));
        assert!(all.iter().any(|r| r.scraped_at > earlier));
    }

    #[tokio::test]
    async fn test_cache_idempotence_two_cached_runs() {
        let strategy = ScriptedStrategy::new(vec![
            ScriptedCall::Ok(ScrapeOutput::cached()),
            ScriptedCall::Ok(ScrapeOutput::cached()),
        ]);
        let runs = MockRunRepository::new();
        let prices = MockPriceRepository::new();
        let notifier = RecordingNotifier::new();

        let scraper = ScraperBuilder::new().with_id(1).build();
        let obs = ObservationBuilder::new().with_price(12.5).build();
        prices
            .create_price_records(&[PriceRecord::from_observation(
                1,
                1,
                &obs,
                Utc::now() - chrono::Duration::hours(1),
            )])
            .await
            .unwrap();

        let executor = executor_with(strategy, runs.clone(), prices.clone(), notifier.clone());
        let first = executor
            .execute(&scraper, ExecuteOptions::default())
            .await
            .unwrap();
        let second = executor
            .execute(&scraper, ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(first.status, ScrapeStatus::Cached);
        assert_eq!(second.status, ScrapeStatus::Cached);
        // 1 seeded + 1 replayed + 1 replayed.
        assert_eq!(prices.record_count(), 3);
        assert!(prices.get_all_records().iter().all(|r| r.price == 12.5));
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_run() {
        let obs = ObservationBuilder::new().build();
        let strategy = ScriptedStrategy::always(vec![obs]);
        let runs = MockRunRepository::new();
        let prices = MockPriceRepository::new();
        let notifier = RecordingNotifier::new();
        notifier.fail_next_checks(true);

        let executor = executor_with(strategy, runs.clone(), prices.clone(), notifier.clone());
        let run = executor
            .execute(&ScraperBuilder::new().build(), ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(run.status, ScrapeStatus::Success);
        assert!(run.log.contains("通知检查失败"));
    }

    #[tokio::test]
    async fn test_last_successful_run_feeds_strategy_context() {
        // The executor must pass the previous SUCCESS timestamp (not a
        // warning's) into the strategy context. Verified with mockall.
        mockall::mock! {
            Strategy {}

            #[async_trait]
            impl ScrapeStrategy for Strategy {
                #[mockall::concretize]
                async fn scrape(
                    &self,
                    url: &str,
                    hints: Option<&str>,
                    ctx: &ScrapeContext,
                ) -> PricewatchResult<ScrapeOutput>;

                fn name(&self) -> &str;
            }
        }

        let success_at = Utc::now() - chrono::Duration::hours(3);
        let runs = MockRunRepository::with_runs(vec![
            RunBuilder::new()
                .with_id(1)
                .for_scraper(7)
                .created_at(success_at)
                .build(),
            RunBuilder::new()
                .with_id(2)
                .for_scraper(7)
                .with_status(ScrapeStatus::Warning)
                .created_at(Utc::now())
                .build(),
        ]);

        let mut strategy = MockStrategy::new();
        strategy
            .expect_scrape()
            .withf(move |url, _, ctx| {
                url.ends_with("/product/1") && ctx.last_successful_run_at == Some(success_at)
            })
            .returning(|_, _, _| Ok(ScrapeOutput::live(Vec::new(), None)));
        strategy.expect_name().return_const("mock".to_string());

        let registry = StrategyRegistry::new(
            Box::new(strategy),
            Box::new(ScriptedStrategy::always(Vec::new())),
            Box::new(ScriptedStrategy::always(Vec::new())),
        );
        let executor = RunExecutor::new(
            registry,
            Arc::new(runs),
            Arc::new(MockPriceRepository::new()),
            Arc::new(RecordingNotifier::new()),
        );

        let scraper = ScraperBuilder::new().with_id(7).build();
        let run = executor
            .execute(&scraper, ExecuteOptions::default())
            .await
            .unwrap();
        assert_eq!(run.status, ScrapeStatus::Warning);
    }
}
