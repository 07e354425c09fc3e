use std::error::Error;
use std::fmt;

/// Returned when an event is posted to a loop that has stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopClosedError;

impl fmt::Display for LoopClosedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the event loop has stopped")
    }
}

impl Error for LoopClosedError {}
