//! The success-rate gauge registry.
//!
//! Snapshots are immutable and published by swapping an `Arc` under a lock
//! that is held only for the swap. There is exactly one [`RegistryWriter`]
//! per registry; [`RegistryReader`]s are cheap to clone and never mutate.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use insights_core::WorkflowInsightRecord;

/// One complete, published set of gauge values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaugeSnapshot {
    /// Workflow name → success rate.
    values: BTreeMap<String, f64>,
    /// Increments on every publish; 0 before the first.
    generation: u64,
}

impl GaugeSnapshot {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Samples in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn names(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }
}

/// The off-side buffer a replacement snapshot is built in.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    values: BTreeMap<String, f64>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from fetched records in fetch order, so the last occurrence of
    /// a duplicated name wins.
    pub fn from_records(records: &[WorkflowInsightRecord]) -> Self {
        let mut builder = Self::new();
        for record in records {
            builder.set(record.name.clone(), record.success_rate());
        }
        builder
    }

    /// Upsert the value for a label.
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

struct Shared {
    current: RwLock<Arc<GaugeSnapshot>>,
}

/// Create a registry, returning its only writer and a reader.
pub fn metric_registry() -> (RegistryWriter, RegistryReader) {
    let shared = Arc::new(Shared {
        current: RwLock::new(Arc::new(GaugeSnapshot::default())),
    });
    let writer = RegistryWriter {
        shared: shared.clone(),
        generation: 0,
    };
    (writer, RegistryReader { shared })
}

/// Write handle. Not `Clone`: whoever owns it is the sole writer.
pub struct RegistryWriter {
    shared: Arc<Shared>,
    generation: u64,
}

impl RegistryWriter {
    /// Replace the published snapshot with the builder's contents.
    pub async fn publish(&mut self, builder: SnapshotBuilder) -> Arc<GaugeSnapshot> {
        self.generation += 1;
        let snapshot = Arc::new(GaugeSnapshot {
            values: builder.values,
            generation: self.generation,
        });
        *self.shared.current.write().await = snapshot.clone();
        snapshot
    }

    /// Publish an empty snapshot.
    pub async fn reset(&mut self) -> Arc<GaugeSnapshot> {
        self.publish(SnapshotBuilder::new()).await
    }

    pub fn reader(&self) -> RegistryReader {
        RegistryReader {
            shared: self.shared.clone(),
        }
    }
}

/// Read handle for scrapers.
#[derive(Clone)]
pub struct RegistryReader {
    shared: Arc<Shared>,
}

impl RegistryReader {
    /// The most recently published snapshot.
    pub async fn snapshot(&self) -> Arc<GaugeSnapshot> {
        self.shared.current.read().await.clone()
    }
}
