//! Analysis run state machine
//!
//! ```text
//! Idle -> Validating -> Starting -> Running -> {Completing | Cancelling | Crashed} -> Idle
//! ```
//!
//! Validation failures go straight back to `Idle`. A run that fails to start
//! is treated as crashed, and cancellation is honoured from `Starting` too.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Phase of an analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    Idle,
    Validating,
    Starting,
    Running,
    Completing,
    Cancelling,
    Crashed,
}

impl RunState {
    /// All states
    pub const ALL: [Self; 7] = [
        Self::Idle,
        Self::Validating,
        Self::Starting,
        Self::Running,
        Self::Completing,
        Self::Cancelling,
        Self::Crashed,
    ];

    /// Check if a run in this state owns a process slot
    #[inline]
    #[must_use]
    pub fn is_active(self) -> bool {
        self != Self::Idle
    }

    /// Check if this state ends the run
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completing | Self::Cancelling | Self::Crashed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Completing => "completing",
            Self::Cancelling => "cancelling",
            Self::Crashed => "crashed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal run transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: RunState,
    pub to: RunState,
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: RunState) -> Vec<RunState> {
    use RunState::{Cancelling, Completing, Crashed, Idle, Running, Starting, Validating};
    match from {
        Idle => vec![Validating],
        Validating => vec![Starting, Idle],
        Starting => vec![Running, Cancelling, Crashed],
        Running => vec![Completing, Cancelling, Crashed],
        Completing | Cancelling | Crashed => vec![Idle],
    }
}

/// Check a single transition
///
/// # Errors
/// - `IllegalTransition` if `to` is not reachable from `from`
pub fn validate_transition(from: RunState, to: RunState) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}
