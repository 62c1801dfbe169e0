// SPDX-License-Identifier: MIT OR Apache-2.0
//! The result of handling one failure.

use crate::event::Event;
use crate::failure::FailureRecord;

/// What the caller does next with the unit of work.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The failure was recovered; resume processing with this event.
    Continue(Event),
    /// The failure surfaces to the caller.
    Propagate(FailureRecord),
}

impl Outcome {
    /// Whether processing continues.
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }

    /// Whether the failure propagates.
    pub fn is_propagate(&self) -> bool {
        matches!(self, Self::Propagate(_))
    }

    /// The resulting unit of work in either case.
    pub fn event(&self) -> &Event {
        match self {
            Self::Continue(event) => event,
            Self::Propagate(failure) => failure.event(),
        }
    }

    /// The propagated failure, if any.
    pub fn failure(&self) -> Option<&FailureRecord> {
        match self {
            Self::Continue(_) => None,
            Self::Propagate(failure) => Some(failure),
        }
    }

    /// `Ok` on continue, `Err` on propagate.
    pub fn into_result(self) -> Result<Event, FailureRecord> {
        match self {
            Self::Continue(event) => Ok(event),
            Self::Propagate(failure) => Err(failure),
        }
    }
}
