use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the booth to its host.
///
/// Camera and capture errors terminate the running session. Delivery errors
/// are local to the delivery action and never touch session state.
#[derive(Debug, Error)]
pub enum BoothError {
    #[error("camera blocked: {0}")]
    CameraDenied(String),

    #[error("camera has not been started")]
    CameraNotStarted,

    #[error("failed to load overlay {}: {reason}", path.display())]
    OverlayLoad { path: PathBuf, reason: String },

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("a session is already in progress")]
    SessionBusy,

    #[error("email relay is not configured")]
    DeliveryMisconfigured,

    #[error("missing delivery input: {0}")]
    DeliveryInputMissing(&'static str),

    #[error("an email is already being sent")]
    DeliveryInFlight,

    #[error("email relay request failed: {0}")]
    DeliveryTransport(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = BoothError> = std::result::Result<T, E>;
