pub mod executor;
pub mod notification;
pub mod repository;
pub mod strategy;
pub mod tier;

pub use executor::ScrapeExecutor;
pub use notification::NotificationService;
pub use repository::{
    PriceRepository, ProductScraperRepository, ScraperRunRepository, SettingsRepository,
};
pub use strategy::{ScrapeContext, ScrapeOutput, ScrapeStrategy};
pub use tier::TierRefreshService;
