//! insights-metrics — the exported gauge and the loop that keeps it fresh.
//!
//! Holds the workflow success-rate gauge, renders it in the Prometheus text
//! exposition format, and runs the snapshot scheduler that periodically
//! replaces it with freshly fetched values.
//!
//! # Architecture
//!
//! ```text
//! SnapshotScheduler (sole writer)
//!   ├── InsightSource::fetch_all() → records
//!   ├── SnapshotBuilder (built off to the side)
//!   ├── RegistryWriter::publish() → one pointer swap
//!   └── FailureTracker → Retain | Escalate
//!
//! RegistryReader (cloneable, read-only)
//!   └── snapshot() → render_prometheus() → /metrics
//! ```
//!
//! A reader always sees a complete snapshot: the previous one while a fetch
//! is in flight, the new one after the swap. Failed cycles never touch the
//! published snapshot.

pub mod policy;
pub mod prometheus;
pub mod registry;
pub mod scheduler;

pub use policy::{FailurePolicy, FailureTracker, Verdict};
pub use prometheus::render_prometheus;
pub use registry::{GaugeSnapshot, RegistryReader, RegistryWriter, SnapshotBuilder, metric_registry};
pub use scheduler::{SchedulerError, SchedulerState, SchedulerStatus, SnapshotScheduler, TickOutcome};
