//! A single-owner cooperative event loop.
//!
//! The loop owns a piece of state and mutates it only while handling an
//! event, one event at a time. Async work is never awaited inside a
//! handler; instead handlers spawn tasks that post a completion event back
//! to the loop when they finish. Handlers of those completion events must
//! re-validate that their target is still relevant, since other events
//! may have been handled in the meantime.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod event;
mod event_loop;

pub use error::LoopClosedError;
pub use event::Event;
pub use event_loop::EventLoop;
