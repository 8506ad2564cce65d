use std::sync::Arc;

use chrono::Utc;
use pricewatch_core::config::SchedulerConfig;
use pricewatch_core::models::{JobKind, ScrapeStatus};
use pricewatch_core::settings::RuntimeSettings;
use pricewatch_testing_utils::{
    MockRunRepository, MockScraperRepository, MockTierService, RunBuilder, ScraperBuilder,
    ScriptedExecutor,
};

use crate::queue::ScrapeQueue;
use crate::scheduler::ScrapeScheduler;

fn settings() -> RuntimeSettings {
    RuntimeSettings {
        cache_hours: 168,
        max_valid_price: 10_000.0,
        min_pack_size: 1.0,
        max_pack_size: 1_000.0,
        queue_interval_ms: 120_000,
        queue_history_limit: 100,
    }
}

fn build(
    repo: MockScraperRepository,
    runs: MockRunRepository,
    tiers: MockTierService,
) -> (Arc<ScrapeQueue>, Arc<ScrapeScheduler>) {
    let queue = ScrapeQueue::new(
        &settings(),
        Arc::new(repo.clone()),
        Arc::new(ScriptedExecutor::with_status(ScrapeStatus::Success)),
        Arc::new(tiers.clone()),
    );
    let scheduler = ScrapeScheduler::new(
        Arc::clone(&queue),
        Arc::new(repo),
        Arc::new(runs),
        Arc::new(tiers),
        SchedulerConfig {
            enabled: true,
            poll_interval_seconds: 60,
            tier_refresh_interval_seconds: 43_200,
            run_retention_days: 90,
        },
    );
    (queue, scheduler)
}

#[tokio::test]
async fn test_poll_enqueues_only_due_scrapers() {
    let due = ScraperBuilder::new().with_id(1).build();
    let not_due = ScraperBuilder::new()
        .with_id(2)
        .last_scraped_at(Utc::now())
        .build();
    let disabled = ScraperBuilder::new().with_id(3).disabled().build();
    let repo =
        MockScraperRepository::with_scrapers(vec![due, not_due, disabled]);
    let (queue, scheduler) = build(repo, MockRunRepository::new(), MockTierService::new(Vec::new()));

    let enqueued = scheduler.poll_due_once().await.unwrap();
    assert_eq!(enqueued, 1);

    let state = queue.get_state();
    assert_eq!(state.pending_count, 1);
    assert_eq!(
        state.items[0].kind,
        JobKind::Scrape {
            product_scraper_id: 1
        }
    );
}

#[tokio::test]
async fn test_overlapping_polls_do_not_duplicate_jobs() {
    let due = ScraperBuilder::new().with_id(1).build();
    let repo = MockScraperRepository::with_scrapers(vec![due]);
    let (queue, scheduler) = build(repo, MockRunRepository::new(), MockTierService::new(Vec::new()));

    // A slow batch: the timer fires again before the first drains.
    assert_eq!(scheduler.poll_due_once().await.unwrap(), 1);
    assert_eq!(scheduler.poll_due_once().await.unwrap(), 0);
    assert_eq!(scheduler.poll_due_once().await.unwrap(), 0);

    assert_eq!(queue.get_state().pending_count, 1);
}

#[tokio::test]
async fn test_tier_tick_enqueues_watched_tiers_and_cleans_runs() {
    let repo = MockScraperRepository::new();
    let runs = MockRunRepository::with_runs(vec![
        RunBuilder::new()
            .with_id(1)
            .created_at(Utc::now() - chrono::Duration::days(120))
            .build(),
        RunBuilder::new().with_id(2).created_at(Utc::now()).build(),
    ]);
    let tiers = MockTierService::new(vec!["USD".to_string(), "JPY".to_string()]);
    let (queue, scheduler) = build(repo, runs.clone(), tiers);

    scheduler.tier_tick().await;

    let state = queue.get_state();
    assert_eq!(state.pending_count, 2);
    assert!(state
        .items
        .iter()
        .all(|j| matches!(j.kind, JobKind::TierRefresh { .. })));

    // The 120-day-old run fell past the 90-day retention.
    assert_eq!(runs.count(), 1);
}

#[tokio::test]
async fn test_scheduler_start_runs_immediate_poll() {
    let due = ScraperBuilder::new().with_id(1).build();
    let repo = MockScraperRepository::with_scrapers(vec![due]);
    let (queue, scheduler) = build(repo, MockRunRepository::new(), MockTierService::new(Vec::new()));

    scheduler.start();
    // The due timer's first tick fires immediately.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(queue.get_state().pending_count, 1);
    assert_eq!(scheduler.poll_error_count(), 0);

    scheduler.shutdown();
}
