//! 抓取执行侧：提取策略、价格校验与单次执行编排。

pub mod executor;
pub mod extract;
pub mod strategies;
pub mod validation;

pub use executor::{ExecuteOptions, RunExecutor};
pub use strategies::{
    ExtractionApiStrategy, LocalLlmStrategy, StaticHtmlStrategy, StrategyRegistry,
};
pub use validation::PriceLimits;
