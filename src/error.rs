//! Errors raised by the session engine.

use thiserror::Error;

use crate::{dao::storage::StorageError, state::state_machine::InvalidTransition};

/// Errors raised by session engine operations.
///
/// Most of them end up as a diagnostic log line; only resume failures are
/// reported back to chat.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested transition is not valid from the current phase.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// A round is already running.
    #[error("a trivia round is already active")]
    AlreadyActive,
    /// The operation needs a running round.
    #[error("no trivia round is active")]
    NotActive,
    /// The operation needs an open question.
    #[error("no question is open")]
    QuestionClosed,
    /// Hints must be revealed one level at a time.
    #[error("hint level {requested} requested after {revealed} hint(s)")]
    HintOutOfOrder {
        /// Level that was asked for.
        requested: u8,
        /// Hints already revealed.
        revealed: u8,
    },
    /// Resume was requested but nothing was backed up.
    #[error("no trivia backup found")]
    NoBackup,
    /// The backup exists but cannot describe a valid round.
    #[error("corrupt trivia backup: {0}")]
    CorruptBackup(String),
    /// The store could not be reached.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
