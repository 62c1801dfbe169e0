// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flow-level error counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Atomic error counters shared by the handlers of one flow.
#[derive(Debug, Default)]
pub struct FlowStatistics {
    execution_errors: AtomicU64,
    fatal_errors: AtomicU64,
    handled: AtomicU64,
    propagated: AtomicU64,
    critical_bypasses: AtomicU64,
}

impl FlowStatistics {
    /// Zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A failure entered an on-error handler.
    pub fn increment_execution_errors(&self) {
        self.execution_errors.fetch_add(1, Relaxed);
    }

    /// A recovery processor failed.
    pub fn increment_fatal_errors(&self) {
        self.fatal_errors.fetch_add(1, Relaxed);
    }

    /// A handler produced a continue outcome.
    pub fn increment_handled(&self) {
        self.handled.fetch_add(1, Relaxed);
    }

    /// A handler produced a propagate outcome.
    pub fn increment_propagated(&self) {
        self.propagated.fetch_add(1, Relaxed);
    }

    /// A critical failure skipped every handler.
    pub fn increment_critical_bypasses(&self) {
        self.critical_bypasses.fetch_add(1, Relaxed);
    }

    /// Point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            execution_errors: self.execution_errors.load(Relaxed),
            fatal_errors: self.fatal_errors.load(Relaxed),
            handled: self.handled.load(Relaxed),
            propagated: self.propagated.load(Relaxed),
            critical_bypasses: self.critical_bypasses.load(Relaxed),
        }
    }
}

/// Serialisable snapshot of [`FlowStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    /// Failures that entered an on-error handler.
    pub execution_errors: u64,
    /// Recovery processor failures.
    pub fatal_errors: u64,
    /// Continue outcomes.
    pub handled: u64,
    /// Propagate outcomes from handlers.
    pub propagated: u64,
    /// Critical failures that bypassed the chain.
    pub critical_bypasses: u64,
}
