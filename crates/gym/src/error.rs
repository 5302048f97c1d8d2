use nes::NesError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GymError {
    #[error("unknown environment identifier {0:?}")]
    UnknownIdentifier(String),
    #[error("environment identifier {0:?} is already registered")]
    DuplicateIdentifier(String),
    #[error("malformed environment identifier {id:?}: {reason}")]
    InvalidIdentifier { id: String, reason: String },
    #[error("emulator unavailable: {0}")]
    EmulatorUnavailable(String),
    #[error("action {action} outside 0..{count}")]
    InvalidAction { action: i64, count: usize },
    #[error("session not ready; call reset first")]
    NotReady,
    #[error("session is closed")]
    SessionClosed,
    #[error("emulator timed out after {0:?}; session must be reset")]
    EmulatorTimeout(std::time::Duration),
    #[error("emulator fault: {0}")]
    Emulator(#[source] NesError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<NesError> for GymError {
    fn from(err: NesError) -> Self {
        match err {
            NesError::Unavailable(_) | NesError::RomNotFound(_) | NesError::FullscreenRejected => {
                GymError::EmulatorUnavailable(err.to_string())
            }
            NesError::Timeout(after) => GymError::EmulatorTimeout(after),
            other => GymError::Emulator(other),
        }
    }
}

impl From<serde_json::Error> for GymError {
    fn from(err: serde_json::Error) -> Self {
        GymError::Config(err.to_string())
    }
}
