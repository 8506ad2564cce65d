//! Mock implementations for all repository and service traits
//!
//! This module provides in-memory mock implementations that can be used
//! for unit testing without requiring actual database connections or
//! external services.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pricewatch_core::errors::{PricewatchError, PricewatchResult};
use pricewatch_core::models::{
    PriceObservation, PriceRecord, ProductScraper, Retailer, ScrapeStatus, ScraperRun,
};
use pricewatch_core::models::RunLog;
use pricewatch_core::traits::{
    NotificationService, PriceRepository, ProductScraperRepository, ScrapeContext, ScrapeExecutor,
    ScrapeOutput, ScrapeStrategy, ScraperRunRepository, SettingsRepository, TierRefreshService,
};

/// Mock implementation of ProductScraperRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockScraperRepository {
    scrapers: Arc<Mutex<HashMap<i64, ProductScraper>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockScraperRepository {
    pub fn new() -> Self {
        Self {
            scrapers: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn with_scrapers(scrapers: Vec<ProductScraper>) -> Self {
        let mut map = HashMap::new();
        let mut max_id = 0;
        for scraper in scrapers {
            if scraper.id > max_id {
                max_id = scraper.id;
            }
            map.insert(scraper.id, scraper);
        }
        Self {
            scrapers: Arc::new(Mutex::new(map)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
        }
    }

    pub fn count(&self) -> usize {
        self.scrapers.lock().unwrap().len()
    }

    pub fn get_all(&self) -> Vec<ProductScraper> {
        self.scrapers.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl ProductScraperRepository for MockScraperRepository {
    async fn create(&self, scraper: &ProductScraper) -> PricewatchResult<ProductScraper> {
        let mut scrapers = self.scrapers.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let mut new_scraper = scraper.clone();
        new_scraper.id = *next_id;
        *next_id += 1;

        scrapers.insert(new_scraper.id, new_scraper.clone());
        Ok(new_scraper)
    }

    async fn get_by_id(&self, id: i64) -> PricewatchResult<Option<ProductScraper>> {
        Ok(self.scrapers.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_product_id(&self, product_id: i64) -> PricewatchResult<Vec<ProductScraper>> {
        let mut scrapers: Vec<ProductScraper> = self
            .scrapers
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.product_id == product_id)
            .cloned()
            .collect();
        scrapers.sort_by_key(|s| s.id);
        Ok(scrapers)
    }

    async fn update(&self, scraper: &ProductScraper) -> PricewatchResult<()> {
        self.scrapers
            .lock()
            .unwrap()
            .insert(scraper.id, scraper.clone());
        Ok(())
    }

    async fn get_scrapers_needing_run(&self) -> PricewatchResult<Vec<ProductScraper>> {
        let now = Utc::now();
        let mut due: Vec<ProductScraper> = self
            .scrapers
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|s| s.id);
        Ok(due)
    }

    async fn mark_as_run(
        &self,
        id: i64,
        status: ScrapeStatus,
        error: Option<&str>,
    ) -> PricewatchResult<()> {
        let mut scrapers = self.scrapers.lock().unwrap();
        let scraper = scrapers
            .get_mut(&id)
            .ok_or(PricewatchError::ScraperNotFound { id })?;
        scraper.last_scraped_at = Some(Utc::now());
        scraper.last_scrape_status = Some(status);
        scraper.last_scrape_error = if status == ScrapeStatus::Error {
            error.map(|e| e.to_string())
        } else {
            None
        };
        scraper.updated_at = Utc::now();
        Ok(())
    }

    async fn get_scrapers_with_issues(&self) -> PricewatchResult<Vec<ProductScraper>> {
        let mut issues: Vec<ProductScraper> = self
            .scrapers
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.has_issue())
            .cloned()
            .collect();
        issues.sort_by_key(|s| s.id);
        Ok(issues)
    }

    async fn dismiss_issue(&self, id: i64, dismissed_at: DateTime<Utc>) -> PricewatchResult<()> {
        let mut scrapers = self.scrapers.lock().unwrap();
        let scraper = scrapers
            .get_mut(&id)
            .ok_or(PricewatchError::ScraperNotFound { id })?;
        scraper.issue_dismissed_at = Some(dismissed_at);
        Ok(())
    }
}

/// Mock implementation of ScraperRunRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockRunRepository {
    runs: Arc<Mutex<Vec<ScraperRun>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockRunRepository {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn with_runs(runs: Vec<ScraperRun>) -> Self {
        let max_id = runs.iter().map(|r| r.id).max().unwrap_or(0);
        Self {
            runs: Arc::new(Mutex::new(runs)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
        }
    }

    pub fn get_all(&self) -> Vec<ScraperRun> {
        self.runs.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[async_trait]
impl ScraperRunRepository for MockRunRepository {
    async fn create(&self, run: &ScraperRun) -> PricewatchResult<ScraperRun> {
        let mut runs = self.runs.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let mut new_run = run.clone();
        new_run.id = *next_id;
        *next_id += 1;

        runs.push(new_run.clone());
        Ok(new_run)
    }

    async fn get_by_id(&self, id: i64) -> PricewatchResult<Option<ScraperRun>> {
        Ok(self.runs.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn get_last_successful_run(
        &self,
        product_scraper_id: i64,
    ) -> PricewatchResult<Option<ScraperRun>> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.product_scraper_id == product_scraper_id && r.status == ScrapeStatus::Success
            })
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn get_recent_runs(
        &self,
        product_scraper_id: i64,
        limit: i64,
    ) -> PricewatchResult<Vec<ScraperRun>> {
        let mut runs: Vec<ScraperRun> = self
            .runs
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.product_scraper_id == product_scraper_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.truncate(limit as usize);
        Ok(runs)
    }

    async fn cleanup_old_runs(&self, days: i32) -> PricewatchResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(days as i64);
        let mut runs = self.runs.lock().unwrap();
        let before = runs.len();
        runs.retain(|r| r.created_at >= cutoff);
        Ok((before - runs.len()) as u64)
    }
}

/// Mock implementation of PriceRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockPriceRepository {
    retailers: Arc<Mutex<HashMap<String, Retailer>>>,
    records: Arc<Mutex<Vec<PriceRecord>>>,
    next_retailer_id: Arc<Mutex<i64>>,
    next_record_id: Arc<Mutex<i64>>,
}

impl MockPriceRepository {
    pub fn new() -> Self {
        Self {
            retailers: Arc::new(Mutex::new(HashMap::new())),
            records: Arc::new(Mutex::new(Vec::new())),
            next_retailer_id: Arc::new(Mutex::new(1)),
            next_record_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn get_all_records(&self) -> Vec<PriceRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceRepository for MockPriceRepository {
    async fn get_or_create_retailer(
        &self,
        name: &str,
        domain: Option<&str>,
    ) -> PricewatchResult<Retailer> {
        let mut retailers = self.retailers.lock().unwrap();
        if let Some(existing) = retailers.get(name) {
            return Ok(existing.clone());
        }
        let mut next_id = self.next_retailer_id.lock().unwrap();
        let retailer = Retailer {
            id: *next_id,
            name: name.to_string(),
            domain: domain.map(|d| d.to_string()),
        };
        *next_id += 1;
        retailers.insert(name.to_string(), retailer.clone());
        Ok(retailer)
    }

    async fn create_price_records(&self, records: &[PriceRecord]) -> PricewatchResult<()> {
        let mut stored = self.records.lock().unwrap();
        let mut next_id = self.next_record_id.lock().unwrap();
        for record in records {
            let mut new_record = record.clone();
            new_record.id = *next_id;
            *next_id += 1;
            stored.push(new_record);
        }
        Ok(())
    }

    async fn get_latest_prices_for_scraper(
        &self,
        product_scraper_id: i64,
    ) -> PricewatchResult<Vec<PriceRecord>> {
        let records = self.records.lock().unwrap();
        let latest = records
            .iter()
            .filter(|r| r.product_scraper_id == product_scraper_id)
            .map(|r| r.scraped_at)
            .max();
        Ok(match latest {
            Some(ts) => records
                .iter()
                .filter(|r| r.product_scraper_id == product_scraper_id && r.scraped_at == ts)
                .cloned()
                .collect(),
            None => Vec::new(),
        })
    }
}

/// Mock implementation of SettingsRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockSettingsRepository {
    settings: Arc<Mutex<HashMap<String, String>>>,
}

impl MockSettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(entries: &[(&str, &str)]) -> Self {
        let map = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            settings: Arc::new(Mutex::new(map)),
        }
    }
}

#[async_trait]
impl SettingsRepository for MockSettingsRepository {
    async fn get(&self, key: &str) -> PricewatchResult<Option<String>> {
        Ok(self.settings.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> PricewatchResult<()> {
        self.settings
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Notification service that records every check instead of dispatching
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    checked: Arc<Mutex<Vec<i64>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent check fail, for error-isolation tests
    pub fn fail_next_checks(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn checked_product_ids(&self) -> Vec<i64> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn check_notifications(&self, product_id: i64) -> PricewatchResult<()> {
        self.checked.lock().unwrap().push(product_id);
        if *self.fail.lock().unwrap() {
            return Err(PricewatchError::Notification(
                "webhook unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

/// A single scripted call outcome for [`ScriptedStrategy`]
pub enum ScriptedCall {
    Ok(ScrapeOutput),
    Err(String),
}

/// Scrape strategy that replays a scripted sequence of outcomes and
/// records the calls it receives
pub struct ScriptedStrategy {
    script: Mutex<VecDeque<ScriptedCall>>,
    /// An exhausted (or empty) script falls back to these observations.
    default_prices: Arc<Mutex<Option<Vec<PriceObservation>>>>,
    calls: Arc<Mutex<Vec<(String, bool)>>>,
}

impl ScriptedStrategy {
    pub fn new(script: Vec<ScriptedCall>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            default_prices: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Strategy that always returns the given observations
    pub fn always(prices: Vec<PriceObservation>) -> Self {
        let strategy = Self::new(Vec::new());
        *strategy.default_prices.lock().unwrap() = Some(prices);
        strategy
    }

    /// Recorded (url, force_refresh) pairs, one per scrape call
    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScrapeStrategy for ScriptedStrategy {
    async fn scrape(
        &self,
        url: &str,
        _hints: Option<&str>,
        ctx: &ScrapeContext,
    ) -> PricewatchResult<ScrapeOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), ctx.force_refresh));
        match self.script.lock().unwrap().pop_front() {
            Some(ScriptedCall::Ok(output)) => Ok(output),
            Some(ScriptedCall::Err(reason)) => Err(PricewatchError::ScrapeFailure(reason)),
            None => match self.default_prices.lock().unwrap().clone() {
                Some(prices) => Ok(ScrapeOutput::live(prices, None)),
                None => Ok(ScrapeOutput::live(Vec::new(), None)),
            },
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Scrape executor that returns scripted run outcomes without touching
/// any strategy or network, recording every call it receives
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<PricewatchResult<ScraperRun>>>,
    default_status: ScrapeStatus,
    calls: Arc<Mutex<Vec<(i64, bool)>>>,
    delay: Mutex<Option<std::time::Duration>>,
}

impl ScriptedExecutor {
    /// Executor whose every call yields a run with the given status
    pub fn with_status(status: ScrapeStatus) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_status: status,
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: Mutex::new(None),
        }
    }

    pub fn new(script: Vec<PricewatchResult<ScraperRun>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            default_status: ScrapeStatus::Success,
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: Mutex::new(None),
        }
    }

    /// Simulate slow scrapes (e.g. a long network call) per execution
    pub fn with_delay(self, delay: std::time::Duration) -> Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    /// Recorded (scraper_id, force) pairs, one per execution
    pub fn calls(&self) -> Vec<(i64, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScrapeExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        scraper: &ProductScraper,
        force: bool,
        _log: RunLog,
    ) -> PricewatchResult<ScraperRun> {
        self.calls.lock().unwrap().push((scraper.id, force));
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => {
                let mut run = ScraperRun::new(scraper.id, self.default_status);
                if self.default_status == ScrapeStatus::Success {
                    run.prices_found = 1;
                    run.prices_saved = 1;
                }
                if self.default_status == ScrapeStatus::Error {
                    run.error_message = Some("scripted failure".to_string());
                }
                Ok(run)
            }
        }
    }
}

/// Tier refresh service that records refreshes
#[derive(Debug, Clone, Default)]
pub struct MockTierService {
    tiers: Arc<Mutex<Vec<String>>>,
    refreshed: Arc<Mutex<Vec<String>>>,
}

impl MockTierService {
    pub fn new(tiers: Vec<String>) -> Self {
        Self {
            tiers: Arc::new(Mutex::new(tiers)),
            refreshed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn refreshed_tiers(&self) -> Vec<String> {
        self.refreshed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TierRefreshService for MockTierService {
    async fn watched_tiers(&self) -> PricewatchResult<Vec<String>> {
        Ok(self.tiers.lock().unwrap().clone())
    }

    async fn refresh(&self, tier_id: &str) -> PricewatchResult<()> {
        self.refreshed.lock().unwrap().push(tier_id.to_string());
        Ok(())
    }
}
