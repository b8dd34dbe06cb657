//! Rendering session bracket.
//!
//! Tracks whether a draw session is open and under which projection mode,
//! so content migration can suspend and resume the session without the
//! caller observing a state change.

use crate::error::AtlasError;

/// Projection mode for an open rendering session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Axis-aligned 2D overlay; the cache configures the surface for it.
    Overlay2D,
    /// Caller-managed 3D projection; the cache leaves projection alone.
    Scene3D,
}

/// `Closed → Open(mode, width, height) → Closed` state machine.
///
/// The bracket itself never changes state during a migration suspend /
/// resume cycle; only the device-side surface configuration is torn down
/// and re-established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SessionState {
    #[default]
    Closed,
    Open {
        mode: SessionMode,
        width: u32,
        height: u32,
    },
}

#[derive(Debug, Default)]
pub(crate) struct SessionBracket {
    state: SessionState,
}

impl SessionBracket {
    pub(crate) fn new() -> Self {
        Self { state: SessionState::Closed }
    }

    /// Transition `Closed → Open`. Nested opens are protocol errors.
    pub(crate) fn open(&mut self, mode: SessionMode, width: u32, height: u32) -> Result<(), AtlasError> {
        match self.state {
            SessionState::Closed => {
                self.state = SessionState::Open { mode, width, height };
                Ok(())
            }
            SessionState::Open { .. } => {
                Err(AtlasError::SessionState("begin_session while a session is already open"))
            }
        }
    }

    /// Transition `Open → Closed`, returning the mode that was active.
    pub(crate) fn close(&mut self) -> Result<SessionMode, AtlasError> {
        match self.state {
            SessionState::Open { mode, .. } => {
                self.state = SessionState::Closed;
                Ok(mode)
            }
            SessionState::Closed => {
                Err(AtlasError::SessionState("end_session while no session is open"))
            }
        }
    }

    /// Session parameters if a session is open.
    pub(crate) fn current(&self) -> Option<(SessionMode, u32, u32)> {
        match self.state {
            SessionState::Open { mode, width, height } => Some((mode, width, height)),
            SessionState::Closed => None,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.current().is_some()
    }
}
