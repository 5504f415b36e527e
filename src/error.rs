use thiserror::Error;

/// Failures surfaced by the player's control operations.
///
/// Running out of frames is not an error: it drives the normal finish path.
/// A consumer woken by a cleared or disabled queue simply gets no frame.
#[derive(Debug, Clone, Error)]
pub enum PlayerError {
    #[error("failed to open {source_name}: {reason}")]
    Open { source_name: String, reason: String },

    #[error("seek to {target:.3}s rejected: {reason}")]
    Seek { target: f64, reason: String },

    #[error("no video is open")]
    NoSession,

    #[error("decode worker panicked; session discarded")]
    WorkerPanicked,

    #[error("failed to start thread: {0}")]
    Thread(String),

    #[error("player control thread is gone")]
    Disconnected,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = PlayerError> = std::result::Result<T, E>;
