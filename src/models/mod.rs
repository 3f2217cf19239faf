// Domain models: readings, aggregates, alerts, source snapshots.

mod aggregation;
mod alert;
mod reading;
mod snapshot;
pub mod value;

pub use aggregation::AggregatedReading;
pub use alert::{AlertEvent, AlertRule, Comparator};
pub use reading::{Category, MetricRecord, Reading};
pub use snapshot::{ContainerSnapshot, HostSnapshot};
pub use value::format_value;
