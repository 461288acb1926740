//! Recoverable command failures.
//!
//! Everything here is handled by the command handler that detects it; none of
//! these reach the dispatch loop.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Missing or malformed arguments. The user gets a usage hint.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Position outside the current (pruned) list.
    #[error("position {position} out of range (list has {len} entries)")]
    OutOfRange { position: usize, len: usize },

    /// Origin is not in the allow-list.
    #[error("chat {0} is not permitted")]
    NotPermitted(i64),

    /// Flood gate is closed. Never surfaced to the user.
    #[error("flood gate closed")]
    RateLimited,
}

pub type CommandResult<T> = Result<T, CommandError>;
