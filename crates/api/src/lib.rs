//! REST API层
//!
//! 基于Axum的轻量HTTP接口，暴露队列观察与控制、手动/批量
//! 触发、运行历史与问题视图。业务都在队列与执行器里，这里
//! 只做参数解析、错误映射与响应信封。

pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;

use std::sync::Arc;

use pricewatch_core::traits::{
    ProductScraperRepository, ScraperRunRepository, SettingsRepository,
};
use pricewatch_dispatcher::ScrapeQueue;

pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
pub use routes::create_routes;

/// API处理器共享的依赖
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<ScrapeQueue>,
    pub scrapers: Arc<dyn ProductScraperRepository>,
    pub runs: Arc<dyn ScraperRunRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricewatch_core::models::{JobSource, ScrapeStatus};
    use pricewatch_core::settings::RuntimeSettings;
    use pricewatch_testing_utils::{
        MockRunRepository, MockScraperRepository, MockSettingsRepository, MockTierService,
        ScraperBuilder, ScriptedExecutor,
    };

    fn state_with(repo: MockScraperRepository) -> AppState {
        let settings = RuntimeSettings {
            cache_hours: 168,
            max_valid_price: 10_000.0,
            min_pack_size: 1.0,
            max_pack_size: 1_000.0,
            queue_interval_ms: 120_000,
            queue_history_limit: 100,
        };
        let queue = ScrapeQueue::new(
            &settings,
            Arc::new(repo.clone()),
            Arc::new(ScriptedExecutor::with_status(ScrapeStatus::Success)),
            Arc::new(MockTierService::new(Vec::new())),
        );
        AppState {
            queue,
            scrapers: Arc::new(repo),
            runs: Arc::new(MockRunRepository::new()),
            settings: Arc::new(MockSettingsRepository::new()),
        }
    }

    #[tokio::test]
    async fn test_manual_trigger_enqueues_job() {
        let scraper = ScraperBuilder::new().with_id(1).build();
        let state = state_with(MockScraperRepository::with_scrapers(vec![scraper]));

        let response = handlers::scrapers::trigger_scraper(
            axum::extract::State(state.clone()),
            axum::extract::Path(1),
        )
        .await
        .unwrap();
        assert!(response.success);
        assert_eq!(state.queue.get_state().pending_count, 1);
    }

    #[tokio::test]
    async fn test_manual_trigger_unknown_scraper_is_not_found() {
        let state = state_with(MockScraperRepository::new());
        let result = handlers::scrapers::trigger_scraper(
            axum::extract::State(state),
            axum::extract::Path(99),
        )
        .await;
        assert!(matches!(
            result,
            Err(ApiError::Core(
                pricewatch_core::errors::PricewatchError::ScraperNotFound { id: 99 }
            ))
        ));
    }

    #[tokio::test]
    async fn test_group_trigger_skips_disabled_scrapers() {
        let a = ScraperBuilder::new().with_id(1).with_product_id(5).build();
        let b = ScraperBuilder::new()
            .with_id(2)
            .with_product_id(5)
            .disabled()
            .build();
        let state = state_with(MockScraperRepository::with_scrapers(vec![a, b]));

        let response = handlers::scrapers::trigger_product(
            axum::extract::State(state.clone()),
            axum::extract::Path(5),
        )
        .await
        .unwrap();
        assert_eq!(response.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_interval_update_rejected_while_queue_busy() {
        let scraper = ScraperBuilder::new().with_id(1).build();
        let state = state_with(MockScraperRepository::with_scrapers(vec![scraper.clone()]));
        state.queue.enqueue_scraper(&scraper, JobSource::Scheduled);

        let result = handlers::queue::update_interval(
            axum::extract::State(state.clone()),
            axum::Json(handlers::queue::UpdateIntervalRequest { interval_ms: 60_000 }),
        )
        .await;
        assert!(matches!(
            result,
            Err(ApiError::Core(
                pricewatch_core::errors::PricewatchError::QueueBusy(_)
            ))
        ));
        // The rejected call left the interval untouched.
        assert_eq!(state.queue.get_state().interval_ms, 120_000);
    }
}
