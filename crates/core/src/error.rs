use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};

use docchat_api::{BackendError, ErrorKind as BackendErrorKind};
use docchat_event_loop::LoopClosedError;

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend rejected the credential. The session is cleared.
    Unauthorized,
    /// The request didn't complete, including timeouts.
    Transport,
    /// The backend answered with a failure.
    Server,
    /// The requested entity doesn't exist.
    NotFound,
    /// The input was rejected locally, before any network call.
    Validation,
    /// The controller has been shut down.
    Closed,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ErrorKind::Transport => write!(f, "Network error"),
            ErrorKind::Server => write!(f, "Server error"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::Validation => write!(f, "Invalid input"),
            ErrorKind::Closed => write!(f, "Controller closed"),
        }
    }
}

impl From<BackendErrorKind> for ErrorKind {
    #[inline]
    fn from(kind: BackendErrorKind) -> Self {
        match kind {
            BackendErrorKind::Unauthorized => ErrorKind::Unauthorized,
            BackendErrorKind::NotFound => ErrorKind::NotFound,
            BackendErrorKind::Server => ErrorKind::Server,
            BackendErrorKind::Transport => ErrorKind::Transport,
        }
    }
}

/// Describes a controller error, also used for user-visible notices.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    #[inline]
    fn with_kind(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// Creates a new error with the `Validation` kind.
    #[inline]
    pub fn validation() -> Self {
        Self::with_kind(ErrorKind::Validation)
    }

    /// Creates a new error with the `Transport` kind.
    #[inline]
    pub fn transport() -> Self {
        Self::with_kind(ErrorKind::Transport)
    }

    /// Creates a new error with the `Closed` kind.
    #[inline]
    pub fn closed() -> Self {
        Self::with_kind(ErrorKind::Closed)
    }

    /// Creates an error from a backend error, keeping its message.
    pub fn from_backend<E: BackendError>(err: E) -> Self {
        Self::with_kind(err.kind().into()).with_reason(err.to_string())
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
            reason: Some(reason.into()),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if the backend rejected the credential.
    #[inline]
    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason.as_deref() {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {}

impl From<LoopClosedError> for Error {
    #[inline]
    fn from(_: LoopClosedError) -> Self {
        Self::closed()
    }
}
