//! Error types for scenario-player

use thiserror::Error;

/// Result type for scenario-player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop the player
///
/// Scenario-level failures (timeouts, mismatches) are not errors: they end
/// the scenario with `PLAY_FAILED` and play moves on.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration does not select the scenario player run mode
    #[error("scenario player is not enabled by the configured run mode")]
    NotEnabled,

    /// Scenario state is inconsistent with what the scheduler expects
    #[error("internal error: {0}")]
    Internal(String),

    /// The player's event channel is gone
    #[error("player event channel closed")]
    ChannelClosed,

    #[error("cannot read configuration {path}: {source}")]
    Config {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("report error: {0}")]
    Report(String),

    #[error("core error: {0}")]
    Core(#[from] scenario_core::Error),

    #[error("script error: {0}")]
    Script(#[from] scenario_script::Error),
}

// Compile-time check that Error is Send + Sync so it can cross task boundaries.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
