//! Status transition engine for offers and orders.
//!
//! Each status type is a small acyclic state machine: one initial state that
//! fans out to terminal states. [`transition`] is pure; persisting the result
//! with a conditional write is the caller's job (see `store::Store::update_with`).
use crate::types::ResourceKind;
use std::fmt;

/// A finite status set with its legal moves.
pub trait Lifecycle: Copy + Eq + fmt::Debug + 'static {
    const KIND: ResourceKind;
    const STATES: &'static [Self];

    fn as_str(&self) -> &'static str;

    /// States reachable in one step. Empty for terminal states.
    fn successors(&self) -> &'static [Self];

    fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    fn parse(value: &str) -> Option<Self> {
        Self::STATES.iter().copied().find(|s| s.as_str() == value)
    }
}

/// A record that carries a [`Lifecycle`] status.
pub trait Stateful: Clone {
    type Status: Lifecycle;

    fn status(&self) -> Self::Status;
    fn set_status(&mut self, status: Self::Status);
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{value:?} is not a valid {kind} status")]
    InvalidStatus { kind: ResourceKind, value: String },
    #[error("{kind} cannot move from {from} to {to}")]
    IllegalTransition {
        kind: ResourceKind,
        from: &'static str,
        to: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition<R> {
    Applied {
        record: R,
        from: &'static str,
        to: &'static str,
    },
    /// Requested status equals the current, non-terminal one. Nothing to write.
    Unchanged(R),
}

impl<R> Transition<R> {
    pub fn record(&self) -> &R {
        match self {
            Transition::Applied { record, .. } | Transition::Unchanged(record) => record,
        }
    }
    pub fn into_record(self) -> R {
        match self {
            Transition::Applied { record, .. } | Transition::Unchanged(record) => record,
        }
    }
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

/// Parse a requested status without touching any record.
pub fn parse_status<S: Lifecycle>(requested: &str) -> Result<S, TransitionError> {
    S::parse(requested).ok_or_else(|| TransitionError::InvalidStatus {
        kind: S::KIND,
        value: requested.to_string(),
    })
}

pub fn transition<R: Stateful>(
    record: &R,
    requested: &str,
) -> Result<Transition<R>, TransitionError> {
    let next = parse_status::<R::Status>(requested)?;
    let current = record.status();

    // terminal states reject everything, including a resubmission of themselves
    if current.is_terminal() {
        return Err(illegal(current, next));
    }
    if next == current {
        return Ok(Transition::Unchanged(record.clone()));
    }
    if !current.successors().contains(&next) {
        return Err(illegal(current, next));
    }

    let mut updated = record.clone();
    updated.set_status(next);

    Ok(Transition::Applied {
        record: updated,
        from: current.as_str(),
        to: next.as_str(),
    })
}

fn illegal<S: Lifecycle>(from: S, to: S) -> TransitionError {
    TransitionError::IllegalTransition {
        kind: S::KIND,
        from: from.as_str(),
        to: to.as_str(),
    }
}
