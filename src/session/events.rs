use super::SessionState;

/// Colour of the status indicator shown next to the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Ok,
    Warn,
    Bad,
}

/// Cues the controller gives the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Status { tone: StatusTone, text: String },
    /// Blocking message the user has to acknowledge.
    Alert(String),
    /// The camera is live; start and reset controls may be enabled.
    CameraReady,
    /// The camera could not be acquired; capture controls stay disabled.
    CameraBlocked,
    OverlaySelected { index: usize, name: String },
    GetReady,
    Countdown { shot: u32, remaining: u32 },
    /// Counter reached zero and should be hidden.
    CountdownFinished { shot: u32 },
    Flash { shot: u32 },
    Captured { shot: u32, total: u32 },
    Assembling,
    /// The strip is ready for download or email.
    Presented,
    /// Strip and shots were discarded.
    Cleared,
}

/// Controller state as seen when an event fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub busy: bool,
    pub shots_taken: usize,
}

pub trait SessionObserver {
    fn on_event(&self, event: &SessionEvent, snapshot: &SessionSnapshot);
}

/// Writes session events to the log.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&self, event: &SessionEvent, snapshot: &SessionSnapshot) {
        match event {
            SessionEvent::Status { tone, text } => tracing::info!("[{:?}] {}", tone, text),
            SessionEvent::Alert(message) => tracing::warn!("{}", message),
            SessionEvent::Countdown { shot, remaining } => {
                tracing::info!("Shot {}: {}", shot, remaining)
            }
            SessionEvent::Flash { shot } => tracing::info!("Shot {}: *flash*", shot),
            SessionEvent::Captured { shot, total } => {
                tracing::info!("Captured {}/{}", shot, total)
            }
            other => tracing::debug!("{:?} ({:?})", other, snapshot.state),
        }
    }
}
