//! Graded failure policy for snapshot cycles.
//!
//! Transient failures keep the previous snapshot and wait for the next tick.
//! Failures that point at a broken contract or a bad credential escalate
//! once they repeat across consecutive cycles.

use tracing::warn;

use insights_client::FailureClass;

/// Escalation thresholds, counted in consecutive failing cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Non-retryable HTTP statuses (401, 403, 404, ...).
    pub remote_threshold: u32,
    /// Undecodable bodies and runaway pagination.
    pub decode_threshold: u32,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            remote_threshold: 3,
            decode_threshold: 2,
        }
    }
}

/// What to do after a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep the previously published snapshot and try again next tick.
    Retain,
    /// Stop the exporter.
    Escalate,
}

/// Tracks failed cycles since the last success, and the current run of
/// back-to-back failures of a single class.
///
/// A failure of a different class starts a new run, so only failures on
/// adjacent ticks count toward a threshold.
#[derive(Debug)]
pub struct FailureTracker {
    policy: FailurePolicy,
    consecutive_failures: u32,
    run: Option<(FailureClass, u32)>,
}

impl FailureTracker {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            consecutive_failures: 0,
            run: None,
        }
    }

    /// A successful cycle clears every counter.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.run = None;
    }

    /// Record a failed cycle and decide whether to keep going.
    pub fn record_failure(&mut self, class: FailureClass) -> Verdict {
        self.consecutive_failures += 1;
        let count = match self.run {
            Some((current, count)) if current == class => count + 1,
            _ => 1,
        };
        self.run = Some((class, count));

        let threshold = match class {
            FailureClass::Transport | FailureClass::RetryableRemote => return Verdict::Retain,
            FailureClass::Remote => self.policy.remote_threshold,
            FailureClass::Decode => self.policy.decode_threshold,
        };
        if count >= threshold {
            warn!(?class, count, threshold, "failure threshold reached");
            Verdict::Escalate
        } else {
            Verdict::Retain
        }
    }

    /// Failed cycles since the last success, of any class.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Class and length of the current run of same-class failures.
    pub fn current_run(&self) -> Option<(FailureClass, u32)> {
        self.run
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(FailurePolicy::default())
    }
}
