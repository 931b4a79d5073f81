pub mod collector;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod server;
pub mod status;

pub use collector::{Collector, CycleState};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use fetcher::{DataFetcher, StatusFetcher};
pub use metrics::sink::{MetricSink, PrometheusSink};
