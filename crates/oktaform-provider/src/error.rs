use oktaform_client::ClientError;
use oktaform_core::CoreError;
use thiserror::Error;

/// Text the platform returns while an asynchronous schema cleanup is
/// still running for a key that is being recreated.
pub const CLEANUP_IN_PROGRESS: &str =
    "Wait until the data clean up process finishes and then try again";

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("precondition violated: {0}")]
    PreconditionViolated(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("{0}")]
    UpdateForbidden(String),

    #[error("{0}")]
    Unknown(String),

    #[error("state error: {0}")]
    State(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionerError {
    /// Prepend resource identity and the operation to the error message.
    pub fn with_resource(self, label: &str, op: &str) -> Self {
        self.prefixed(&format!("{label} ({op})"))
    }

    /// Prepend `context` to message-carrying variants.
    pub fn prefixed(self, context: &str) -> Self {
        let wrap = |msg: String| format!("{context}: {msg}");
        match self {
            Self::NotFound(msg) => Self::NotFound(wrap(msg)),
            Self::PreconditionViolated(msg) => Self::PreconditionViolated(wrap(msg)),
            Self::Conflict(msg) => Self::Conflict(wrap(msg)),
            Self::Forbidden(msg) => Self::Forbidden(wrap(msg)),
            Self::Throttled(msg) => Self::Throttled(wrap(msg)),
            Self::Transient(msg) => Self::Transient(wrap(msg)),
            Self::UpdateForbidden(msg) => Self::UpdateForbidden(wrap(msg)),
            Self::Unknown(msg) => Self::Unknown(wrap(msg)),
            Self::State(msg) => Self::State(wrap(msg)),
            Self::DeadlineExceeded(msg) => Self::DeadlineExceeded(wrap(msg)),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }

    /// Worth retrying inside a consistency retry loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Throttled(_))
    }
}

impl From<ClientError> for ProvisionerError {
    /// Map a client failure onto the taxonomy using the HTTP status and
    /// the platform's error text.
    fn from(err: ClientError) -> Self {
        if matches!(err, ClientError::Cancelled) {
            return Self::Cancelled;
        }
        let msg = format_err_chain(&err);
        if err.message_contains(CLEANUP_IN_PROGRESS) {
            return Self::Transient(msg);
        }
        match err.status() {
            Some(404) => Self::NotFound(msg),
            Some(409) => Self::Conflict(msg),
            Some(403) => Self::Forbidden(msg),
            Some(429) => Self::Throttled(msg),
            Some(s) if s >= 500 => Self::Transient(msg),
            _ if err.message_contains("already exists") => Self::Conflict(msg),
            _ if matches!(err, ClientError::Http(_)) => Self::Transient(msg),
            _ => Self::Unknown(msg),
        }
    }
}

impl From<CoreError> for ProvisionerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidAttribute { .. }
            | CoreError::MissingField(_)
            | CoreError::ImportFormat { .. } => Self::PreconditionViolated(err.to_string()),
            CoreError::MissingId => Self::State(err.to_string()),
            CoreError::Serialization(e) => Self::Serialization(e),
            CoreError::UnknownStatus(_) => Self::Unknown(err.to_string()),
        }
    }
}

/// Walk the full error chain and join all causes into one string.
///
/// reqwest errors carry the interesting part (connection refused, TLS
/// failure) in their source chain.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
