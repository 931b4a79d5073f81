pub mod descriptor;
pub mod sink;
pub mod summary;

pub use descriptor::{MetricDescs, ValueKind};
pub use sink::{MetricSink, PrometheusSink};
pub use summary::RunningSummary;
