pub mod price;
pub mod product_scraper;
pub mod queue_job;
pub mod run_log;
pub mod scraper_run;

pub use price::{PriceObservation, PriceRecord, Retailer};
pub use product_scraper::{ProductScraper, ScraperType};
pub use queue_job::{JobKind, JobSource, JobStatus, QueueJob};
pub use run_log::RunLog;
pub use scraper_run::{ScrapeStatus, ScraperRun};
