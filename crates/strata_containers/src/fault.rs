//! Partial-failure aggregation
//!
//! Per-item failures during a pass are reported to a [`FailureCollector`]
//! instead of being returned, so one bad folder never aborts the others.
//! Whether accumulated failures should still block a backup is the
//! collector's policy.

use crate::error::ResolverError;
use std::sync::{Mutex, PoisonError};

/// Sink for recoverable failures.
pub trait FailureCollector: Send + Sync {
    /// Record a failure that affects one item only.
    fn add_recoverable(&self, err: ResolverError);

    /// The terminal failure observed so far, if any.
    fn failure(&self) -> Option<ResolverError>;
}

#[derive(Debug, Default)]
struct BusState {
    failure: Option<ResolverError>,
    recovered: Vec<ResolverError>,
}

/// Default [`FailureCollector`].
///
/// In fail-fast mode the first recoverable error also becomes the terminal
/// failure, which stops a population pass at its next checkpoint.
#[derive(Debug, Default)]
pub struct FaultBus {
    fail_fast: bool,
    state: Mutex<BusState>,
}

impl FaultBus {
    pub fn new(fail_fast: bool) -> Self {
        Self {
            fail_fast,
            state: Mutex::new(BusState::default()),
        }
    }

    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    /// Set the terminal failure. The first one sticks.
    pub fn fail(&self, err: ResolverError) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.failure.is_none() {
            state.failure = Some(err);
        }
    }

    /// Every recoverable error, in the order reported.
    pub fn recovered(&self) -> Vec<ResolverError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recovered
            .clone()
    }
}

impl FailureCollector for FaultBus {
    fn add_recoverable(&self, err: ResolverError) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if self.fail_fast && state.failure.is_none() {
            state.failure = Some(err.clone());
        }
        state.recovered.push(err);
    }

    fn failure(&self) -> Option<ResolverError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failure
            .clone()
    }
}
