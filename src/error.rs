use thiserror::Error;

/// Local, pre-flight refusals. Recoverable by changing the request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    // Voting
    #[error("This poll is closed")]
    PollClosed,
    #[error("You have already voted on this poll")]
    AlreadyVoted,
    #[error("Select exactly one option")]
    InvalidSelectionCount,
    #[error("Select at least one option")]
    EmptySelection,
    #[error("Unknown poll option: {0}")]
    UnknownOption(String),
    #[error("Option selected more than once: {0}")]
    DuplicateOption(String),
    #[error("Voters are hidden for anonymous polls")]
    AnonymousPoll,

    // Authoring
    #[error("Question is required")]
    EmptyQuestion,
    #[error("A poll needs at least {min} options")]
    TooFewOptions { min: usize },
    #[error("A poll can have at most {max} options")]
    TooManyOptions { max: usize },
    #[error("Option {index} cannot be empty")]
    EmptyOption { index: usize },
    #[error("A poll must keep at least two options")]
    MinimumOptionsReached,
    #[error("Maximum of 10 options allowed")]
    MaximumOptionsReached,
}

/// Failures reported by the remote authority or the transport reaching it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    #[error("Rejected by server: {0}")]
    Rejected(String),
    #[error("Poll not found for message {0}")]
    NotFound(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// The single terminal failure of a user-facing poll action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("The server refused the request: {0}")]
    AuthorityRejected(String),
    #[error("Could not reach the server, please try again: {0}")]
    Transport(String),
    #[error("Poll {0} has not been loaded yet")]
    NotLoaded(String),
}

impl ActionError {
    /// Transport failures are worth retrying as-is; everything else needs a
    /// different request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActionError::Transport(_))
    }
}

impl From<AuthorityError> for ActionError {
    fn from(err: AuthorityError) -> Self {
        match err {
            // Authority refusals display like local ones
            AuthorityError::Rejected(reason) => ActionError::AuthorityRejected(reason),
            AuthorityError::NotFound(message_id) => {
                let reason = format!("no poll attached to message {}", message_id);
                ActionError::AuthorityRejected(reason)
            }
            AuthorityError::Transport(cause) => ActionError::Transport(cause),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_errors_map_to_typed_action_errors() {
        let err: ActionError = AuthorityError::Rejected("Poll is closed".into()).into();
        assert_eq!(err, ActionError::AuthorityRejected("Poll is closed".into()));
        assert!(!err.is_retryable());

        let err: ActionError = AuthorityError::Transport("timed out".into()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn rejections_render_human_readable_messages() {
        let err = ActionError::from(Rejection::MaximumOptionsReached);
        assert_eq!(err.to_string(), "Maximum of 10 options allowed");
        assert_eq!(
            Rejection::UnknownOption("x".into()).to_string(),
            "Unknown poll option: x"
        );
    }
}
