//! Request events, the shared event sink, and latency aggregation.
mod histogram;
mod sink;
mod stats;
mod types;


pub use histogram::LatencyHistogram;
pub use sink::EventSink;
pub use stats::{AggregateStats, OperationStats, StatsKey};
pub use types::{EventKind, RequestEvent};
