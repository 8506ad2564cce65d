//! Shared test utilities: in-memory mocks and data builders.

pub mod builders;
pub mod mocks;

pub use builders::{ObservationBuilder, RunBuilder, ScraperBuilder};
pub use mocks::{
    MockPriceRepository, MockRunRepository, MockScraperRepository, MockSettingsRepository,
    MockTierService, RecordingNotifier, ScriptedCall, ScriptedExecutor, ScriptedStrategy,
};
