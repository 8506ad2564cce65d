//! 基础设施层：SQLite持久化、webhook通知、汇率档位刷新。

pub mod database;
pub mod notifier;
pub mod rates;

pub use database::sqlite::{
    SqliteDatabase, SqlitePriceRepository, SqliteRunRepository, SqliteScraperRepository,
    SqliteSettingsRepository,
};
pub use notifier::WebhookNotifier;
pub use rates::CurrencyTierService;
