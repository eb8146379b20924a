//! Snapshot scheduler — the fetch-and-publish loop.
//!
//! Owns the registry's only writer. Each tick fetches the complete record
//! set, builds a replacement snapshot off to the side, and publishes it with
//! a single swap. A failed fetch leaves the published snapshot untouched and
//! is graded by the [`FailureTracker`].
//!
//! ```text
//! Idle ──tick──▶ Fetching ──ok──▶ Publishing ──▶ Idle
//!                   │
//!                   └─err─▶ Retain ──▶ Idle
//!                           Escalate ──▶ Failed
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use insights_client::{FailureClass, FetchError, InsightSource};

use crate::policy::{FailurePolicy, FailureTracker, Verdict};
use crate::registry::{RegistryWriter, SnapshotBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    #[default]
    Idle,
    Fetching,
    Publishing,
    Failed,
}

/// Externally visible scheduler progress, served on `/healthz`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    /// Completed cycles, successful or not.
    pub cycles: u64,
    /// Workflows in the last published snapshot.
    pub workflows: usize,
    pub consecutive_failures: u32,
    pub last_success_epoch: Option<u64>,
    pub last_error: Option<String>,
}

/// Result of a single cycle.
#[derive(Debug)]
pub enum TickOutcome {
    Published { workflows: usize },
    /// The fetch failed; the previous snapshot is still being served.
    Retained { error: FetchError },
    /// The fetch failed and the policy says to stop.
    Escalated { error: FetchError },
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("snapshot scheduler gave up after {run_length} consecutive {class:?} failures: {source}")]
    Escalated {
        class: FailureClass,
        run_length: u32,
        #[source]
        source: FetchError,
    },
}

/// Periodically replaces the registry's snapshot with fresh insights.
pub struct SnapshotScheduler<S> {
    source: S,
    writer: RegistryWriter,
    interval: Duration,
    tracker: FailureTracker,
    status: watch::Sender<SchedulerStatus>,
}

impl<S: InsightSource> SnapshotScheduler<S> {
    pub fn new(source: S, writer: RegistryWriter, interval: Duration) -> Self {
        let (status, _) = watch::channel(SchedulerStatus::default());
        Self {
            source,
            writer,
            interval,
            tracker: FailureTracker::default(),
            status,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.tracker = FailureTracker::new(policy);
        self
    }

    /// Subscribe to status updates.
    pub fn status(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.subscribe()
    }

    /// Run exactly one fetch-and-publish cycle.
    pub async fn tick(&mut self) -> TickOutcome {
        self.set_state(SchedulerState::Fetching);

        match self.source.fetch_all().await {
            Ok(records) => {
                self.set_state(SchedulerState::Publishing);
                let builder = SnapshotBuilder::from_records(&records);
                let snapshot = self.writer.publish(builder).await;
                self.tracker.record_success();

                let workflows = snapshot.len();
                self.status.send_modify(|status| {
                    status.state = SchedulerState::Idle;
                    status.cycles += 1;
                    status.workflows = workflows;
                    status.consecutive_failures = 0;
                    status.last_success_epoch = Some(epoch_secs());
                    status.last_error = None;
                });
                debug!(
                    records = records.len(),
                    workflows,
                    generation = snapshot.generation(),
                    "workflow insights snapshot published"
                );
                TickOutcome::Published { workflows }
            }
            Err(error) => {
                let class = error.class();
                let verdict = self.tracker.record_failure(class);
                let consecutive_failures = self.tracker.consecutive_failures();
                let run_length = self.tracker.current_run().map_or(0, |(_, count)| count);
                let state = match verdict {
                    Verdict::Retain => SchedulerState::Idle,
                    Verdict::Escalate => SchedulerState::Failed,
                };
                self.status.send_modify(|status| {
                    status.state = state;
                    status.cycles += 1;
                    status.consecutive_failures = consecutive_failures;
                    status.last_error = Some(error.to_string());
                });

                match verdict {
                    Verdict::Retain => {
                        warn!(
                            error = %error,
                            ?class,
                            consecutive_failures,
                            "snapshot cycle failed, keeping previous values"
                        );
                        TickOutcome::Retained { error }
                    }
                    Verdict::Escalate => {
                        error!(
                            error = %error,
                            ?class,
                            run_length,
                            consecutive_failures,
                            "snapshot cycle failed, escalating"
                        );
                        TickOutcome::Escalated { error }
                    }
                }
            }
        }
    }

    /// Run cycles until shutdown or escalation.
    ///
    /// The first cycle starts immediately. Cycles run one after another in
    /// this task; one that overruns the interval delays the next instead of
    /// overlapping it.
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SchedulerError> {
        info!(
            interval_secs = self.interval.as_secs(),
            "snapshot scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let TickOutcome::Escalated { error } = self.tick().await {
                        let run_length = self.tracker.current_run().map_or(0, |(_, count)| count);
                        return Err(SchedulerError::Escalated {
                            class: error.class(),
                            run_length,
                            source: error,
                        });
                    }
                }
                _ = shutdown.changed() => {
                    info!("snapshot scheduler shutting down");
                    return Ok(());
                }
            }
        }
    }

    fn set_state(&self, state: SchedulerState) {
        self.status.send_modify(|status| status.state = state);
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
