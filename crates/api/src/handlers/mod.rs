pub mod queue;
pub mod scrapers;
