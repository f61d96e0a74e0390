//! Route risk scoring: sample each step's geometry, match the samples to
//! scored street segments, and roll the matches up per step and per route.

pub mod aggregator;
pub mod sampler;
pub mod scorer;

pub use aggregator::RiskAggregator;
pub use sampler::sample;
pub use scorer::RouteScorer;
