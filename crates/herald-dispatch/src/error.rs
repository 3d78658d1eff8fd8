use herald_core::TaskKind;
use thiserror::Error;

/// Errors reported by a [`ChatClient`](crate::chat::ChatClient).
#[derive(Debug, Error)]
pub enum ChatError {
    /// The mask had no ban to lift.
    #[error("{mask} is not banned in {channel}")]
    NotBanned { channel: String, mask: String },

    /// The mask had no mute to lift.
    #[error("{mask} is not muted in {channel}")]
    NotMuted { channel: String, mask: String },

    /// The bot refused or failed the action.
    #[error("Chat bridge rejected {action}: {status} {message}")]
    Rejected {
        action: &'static str,
        status: u16,
        message: String,
    },

    /// The request to the bot's control endpoint did not complete.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ChatError {
    /// True when the action was a no-op because its target state already holds.
    pub fn is_already_done(&self) -> bool {
        matches!(self, ChatError::NotBanned { .. } | ChatError::NotMuted { .. })
    }
}

/// Errors that can occur while handling a delivered task.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("Task error: {0}")]
    Task(#[from] herald_core::CoreError),

    /// Kind is known but nobody registered a handler for it.
    #[error("No handler registered for {0}")]
    NoHandler(TaskKind),

    /// A handler was given a payload of another kind.
    #[error("Handler for {expected} received a {got} task")]
    WrongPayload { expected: &'static str, got: TaskKind },
}

pub type Result<T> = std::result::Result<T, DispatchError>;
