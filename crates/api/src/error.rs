use std::fmt::{self, Display};

/// The kind of error that occurred while talking to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend rejected the credential, or the operation requires one.
    Unauthorized,
    /// The requested entity doesn't exist (or isn't visible to the caller).
    NotFound,
    /// The backend answered with a non-success status.
    Server,
    /// The request didn't complete: connection failures, timeouts and
    /// malformed responses.
    Transport,
}

impl ErrorKind {
    /// Returns `true` if this error should clear the local session.
    #[inline]
    pub fn is_auth_rejection(self) -> bool {
        self == ErrorKind::Unauthorized
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::Server => write!(f, "Server error"),
            ErrorKind::Transport => write!(f, "Transport error"),
        }
    }
}
