//! dex-metrics
//!
//! Price, supply and market cap of a token, derived from its Uniswap V3
//! pool and read through a prioritized list of public RPC endpoints.

pub mod aggregator;
pub mod api;
pub mod chains;
pub mod config;
pub mod error;
pub mod fiat;
pub mod logging;
pub mod metrics;
pub mod reader;

#[cfg(test)]
mod testing;

pub use aggregator::{MetricsAggregator, MetricsRequest};
pub use chains::{ChainConfig, ChainTable};
pub use config::Settings;
pub use error::MetricsError;
pub use metrics::MetricsResult;
