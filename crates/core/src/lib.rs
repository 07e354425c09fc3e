//! Core logic of the chat client: session state, message dispatch,
//! simulated streaming and conversation list reconciliation.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod backend_client;
mod config;
mod controller;
pub mod conversation;
pub mod documents;
mod error;
mod events;
mod session;
pub mod store;
pub mod stream;

pub use config::ControllerConfig;
pub use controller::{Controller, ControllerBuilder, Snapshot};
pub use error::{Error, ErrorKind};
pub use events::ControllerEvent;
