//! Test data builders for creating test entities
//!
//! This module provides builder patterns for creating test data with
//! sensible defaults and easy customization.

use chrono::{DateTime, Utc};
use pricewatch_core::models::{
    PriceObservation, ProductScraper, ScrapeStatus, ScraperRun, ScraperType,
};

/// Builder for creating test ProductScraper entities
pub struct ScraperBuilder {
    scraper: ProductScraper,
}

impl ScraperBuilder {
    pub fn new() -> Self {
        Self {
            scraper: ProductScraper {
                id: 1,
                product_id: 1,
                scraper_type: ScraperType::StaticHtml,
                url: "https://www.example.com/product/1".to_string(),
                scrape_hints: None,
                interval_minutes: 1440,
                enabled: true,
                last_scraped_at: None,
                last_scrape_status: None,
                last_scrape_error: None,
                issue_dismissed_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.scraper.id = id;
        self
    }

    pub fn with_product_id(mut self, product_id: i64) -> Self {
        self.scraper.product_id = product_id;
        self
    }

    pub fn with_type(mut self, scraper_type: ScraperType) -> Self {
        self.scraper.scraper_type = scraper_type;
        self
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.scraper.url = url.to_string();
        self
    }

    pub fn with_hints(mut self, hints: &str) -> Self {
        self.scraper.scrape_hints = Some(hints.to_string());
        self
    }

    pub fn with_interval_minutes(mut self, minutes: i64) -> Self {
        self.scraper.interval_minutes = minutes;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.scraper.enabled = false;
        self
    }

    pub fn last_scraped_at(mut self, at: DateTime<Utc>) -> Self {
        self.scraper.last_scraped_at = Some(at);
        self
    }

    pub fn with_last_status(mut self, status: ScrapeStatus) -> Self {
        self.scraper.last_scrape_status = Some(status);
        self
    }

    pub fn build(self) -> ProductScraper {
        self.scraper
    }
}

impl Default for ScraperBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test PriceObservation values
pub struct ObservationBuilder {
    observation: PriceObservation,
}

impl ObservationBuilder {
    pub fn new() -> Self {
        Self {
            observation: PriceObservation {
                retailer_name: "Example Store".to_string(),
                retailer_domain: Some("example.com".to_string()),
                price: 39.99,
                currency: "AUD".to_string(),
                in_stock: true,
                availability: None,
                product_url: None,
                unit_count: None,
                unit_type: None,
                multi_buy_quantity: None,
                multi_buy_price: None,
            },
        }
    }

    pub fn with_retailer(mut self, name: &str) -> Self {
        self.observation.retailer_name = name.to_string();
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.observation.price = price;
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.observation.currency = currency.to_string();
        self
    }

    pub fn out_of_stock(mut self) -> Self {
        self.observation.in_stock = false;
        self
    }

    pub fn with_unit_count(mut self, count: f64, unit_type: &str) -> Self {
        self.observation.unit_count = Some(count);
        self.observation.unit_type = Some(unit_type.to_string());
        self
    }

    pub fn with_multi_buy(mut self, quantity: i64, total_price: f64) -> Self {
        self.observation.multi_buy_quantity = Some(quantity);
        self.observation.multi_buy_price = Some(total_price);
        self
    }

    pub fn build(self) -> PriceObservation {
        self.observation
    }
}

impl Default for ObservationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test ScraperRun entities
pub struct RunBuilder {
    run: ScraperRun,
}

impl RunBuilder {
    pub fn new() -> Self {
        Self {
            run: ScraperRun {
                id: 1,
                product_scraper_id: 1,
                status: ScrapeStatus::Success,
                prices_found: 1,
                prices_saved: 1,
                error_message: None,
                log: String::new(),
                duration_ms: 1200,
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.run.id = id;
        self
    }

    pub fn for_scraper(mut self, product_scraper_id: i64) -> Self {
        self.run.product_scraper_id = product_scraper_id;
        self
    }

    pub fn with_status(mut self, status: ScrapeStatus) -> Self {
        self.run.status = status;
        self
    }

    pub fn with_counts(mut self, found: i64, saved: i64) -> Self {
        self.run.prices_found = found;
        self.run.prices_saved = saved;
        self
    }

    pub fn with_error(mut self, error: &str) -> Self {
        self.run.status = ScrapeStatus::Error;
        self.run.error_message = Some(error.to_string());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.run.created_at = at;
        self
    }

    pub fn build(self) -> ScraperRun {
        self.run
    }
}

impl Default for RunBuilder {
    fn default() -> Self {
        Self::new()
    }
}
