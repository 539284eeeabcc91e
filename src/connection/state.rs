//! Cursor state machine

use crate::{Error, Result};

/// Cursor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No statement executed yet, or the last execute failed
    Idle,

    /// Statement submitted, eager first fetch in progress
    Executing,

    /// Rows available in the current batch, or more may be fetched
    Streaming,

    /// A fetch returned an empty batch
    Exhausted,
}

impl CursorState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: CursorState) -> bool {
        use CursorState::*;

        matches!(
            (self, next),
            (Idle, Executing)
                | (Executing, Executing)
                | (Streaming, Executing)
                | (Exhausted, Executing)
                | (Executing, Streaming)
                | (Executing, Exhausted)
                | (Executing, Idle)
                | (Streaming, Exhausted)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: CursorState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for CursorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Executing => write!(f, "executing"),
            Self::Streaming => write!(f, "streaming"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}
