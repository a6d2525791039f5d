use crate::api::ApiError;
use misty_realtime::RealtimeError;
use thiserror::Error;

/// Errors that end a run or stream session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No installed skill has the requested name. Raised before any
    /// connection is opened.
    #[error("Unknown skill \"{0}\"")]
    SkillNotFound(String),

    /// The event socket failed to open, failed mid-stream, rejected a
    /// subscription, or delivered an unclassifiable envelope.
    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    #[error(transparent)]
    Api(#[from] ApiError),
}
