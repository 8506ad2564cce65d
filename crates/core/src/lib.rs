pub mod config;
pub mod errors;
pub mod models;
pub mod settings;
pub mod traits;

pub use config::AppConfig;
pub use errors::{PricewatchError, PricewatchResult};
pub use models::{
    JobKind, JobSource, JobStatus, PriceObservation, PriceRecord, ProductScraper, QueueJob,
    Retailer, RunLog, ScrapeStatus, ScraperRun, ScraperType,
};
pub use settings::RuntimeSettings;
pub use traits::{
    NotificationService, PriceRepository, ProductScraperRepository, ScrapeContext, ScrapeExecutor,
    ScrapeOutput, ScrapeStrategy, ScraperRunRepository, SettingsRepository, TierRefreshService,
};
