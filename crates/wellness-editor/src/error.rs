use wellness_types::rules::FieldError;

/// Failure talking to the session store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not signed in")]
    NotAuthenticated,

    /// The server rejected the token; the auth session has been torn down.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Rejected locally; nothing was sent.
    #[error("not ready to publish: {}", join_messages(.0))]
    Validation(Vec<FieldError>),

    #[error("a save is already in progress")]
    SaveInFlight,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("save task was interrupted")]
    Interrupted,
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
