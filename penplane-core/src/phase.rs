/// Lifecycle of one recording session.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    AwaitingConfig,
    Ready,
    Streaming,
    Complete,
    Aborted,
}

impl SessionPhase {
    pub fn accepts_frames(&self) -> bool {
        matches!(self, SessionPhase::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Complete | SessionPhase::Aborted)
    }

    /// Normal progression; terminal phases have no successor.
    pub fn next(&self) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            AwaitingConfig => Ready,
            Ready => Streaming,
            Streaming => Complete,
            Complete | Aborted => return None,
        })
    }

    pub fn abort(&self) -> Self {
        if self.is_terminal() {
            *self
        } else {
            SessionPhase::Aborted
        }
    }
}
