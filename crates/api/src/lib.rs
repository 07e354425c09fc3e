//! Types shared between the chat controller and the document-chat backend.
//!
//! This crate describes the REST contracts of the backend service as plain
//! Rust types, plus the [`Backend`] trait that every backend implementation
//! adheres to. The controller only ever talks to the backend through this
//! trait, which makes it possible to swap the real HTTP client for an
//! in-memory fake in tests.
//!
//! Types in this crate don't define any behavior beyond (de)serialization
//! and a few convenient accessors.

#![deny(missing_docs)]

mod analytics;
mod backend;
mod chat;
mod document;
mod error;
mod identity;

pub use analytics::*;
pub use backend::*;
pub use chat::*;
pub use document::*;
pub use error::*;
pub use identity::*;
