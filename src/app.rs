use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use pricewatch_api::{create_routes, AppState};
use pricewatch_core::config::AppConfig;
use pricewatch_core::settings::RuntimeSettings;
use pricewatch_core::traits::{
    NotificationService, PriceRepository, ProductScraperRepository, ScrapeExecutor,
    ScraperRunRepository, SettingsRepository, TierRefreshService,
};
use pricewatch_dispatcher::{ScrapeQueue, ScrapeScheduler};
use pricewatch_infrastructure::{
    CurrencyTierService, SqliteDatabase, SqlitePriceRepository, SqliteRunRepository,
    SqliteScraperRepository, SqliteSettingsRepository, WebhookNotifier,
};
use pricewatch_worker::{RunExecutor, StrategyRegistry};

/// 主应用程序：组合根
///
/// 队列、调度器等都是显式构造、显式注入的实例，不存在进程级
/// 全局单例；测试各自组装隔离的实例。
pub struct Application {
    config: AppConfig,
    queue: Arc<ScrapeQueue>,
    scheduler: Arc<ScrapeScheduler>,
    api_state: AppState,
}

impl Application {
    /// 初始化全部组件：数据库 → 仓储 → 策略 → 执行器 → 队列 → 调度器
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化pricewatch");

        let database = SqliteDatabase::connect(&config.database)
            .await
            .context("数据库连接失败")?;
        let pool = database.pool();

        let scrapers: Arc<dyn ProductScraperRepository> =
            Arc::new(SqliteScraperRepository::new(pool.clone()));
        let runs: Arc<dyn ScraperRunRepository> = Arc::new(SqliteRunRepository::new(pool.clone()));
        let prices: Arc<dyn PriceRepository> = Arc::new(SqlitePriceRepository::new(pool.clone()));
        let settings_repo: Arc<dyn SettingsRepository> =
            Arc::new(SqliteSettingsRepository::new(pool));

        // 文件配置给默认值，settings表逐项覆盖
        let settings = RuntimeSettings::load(settings_repo.as_ref(), &config)
            .await
            .context("运行期设置加载失败")?;
        info!(
            "运行期设置: 缓存{}小时, 队列间隔{}ms, 历史保留{}条",
            settings.cache_hours, settings.queue_interval_ms, settings.queue_history_limit
        );

        let notifier: Arc<dyn NotificationService> = Arc::new(
            WebhookNotifier::new(config.observability.notification_webhook_url.clone())
                .context("通知分发器构建失败")?,
        );
        let tiers: Arc<dyn TierRefreshService> = Arc::new(
            CurrencyTierService::new(
                Arc::clone(&settings_repo),
                config.scraping.default_currency.clone(),
            )
            .context("汇率服务构建失败")?,
        );

        let strategies = StrategyRegistry::from_config(&config.scraping, &settings)
            .context("策略注册表构建失败")?;
        let executor: Arc<dyn ScrapeExecutor> = Arc::new(RunExecutor::new(
            strategies,
            Arc::clone(&runs),
            Arc::clone(&prices),
            notifier,
        ));

        let queue = ScrapeQueue::new(
            &settings,
            Arc::clone(&scrapers),
            executor,
            Arc::clone(&tiers),
        );
        let scheduler = ScrapeScheduler::new(
            Arc::clone(&queue),
            Arc::clone(&scrapers),
            Arc::clone(&runs),
            tiers,
            config.scheduler.clone(),
        );

        let api_state = AppState {
            queue: Arc::clone(&queue),
            scrapers,
            runs,
            settings: settings_repo,
        };

        Ok(Self {
            config,
            queue,
            scheduler,
            api_state,
        })
    }

    /// 启动全部组件并运行至收到关闭信号
    pub async fn run(self, shutdown: crate::shutdown::ShutdownSignal) -> Result<()> {
        self.queue.start();
        if self.config.scheduler.enabled {
            self.scheduler.start();
        }

        if self.config.api.enabled {
            let router = create_routes(self.api_state.clone(), self.config.api.cors_enabled);
            let listener = TcpListener::bind(&self.config.api.bind_address)
                .await
                .with_context(|| format!("无法监听 {}", self.config.api.bind_address))?;
            info!("API服务监听 {}", self.config.api.bind_address);

            let mut shutdown_rx = shutdown.subscribe();
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .context("API服务异常退出")?;
        } else {
            let mut shutdown_rx = shutdown.subscribe();
            let _ = shutdown_rx.recv().await;
        }

        // 有序停机：先停调度器，再等队列完成手头任务
        info!("开始停机");
        self.scheduler.shutdown();
        self.queue.shutdown().await;
        info!("pricewatch已停止");
        Ok(())
    }
}
