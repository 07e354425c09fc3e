//! An out-of-the-box client for the document-chat service.
//!
//! The crate wires the HTTP backend, a file-backed session store and the
//! chat controller together. It includes a CLI tool for chatting in the
//! terminal, and can also be used as a library to bring the chat into your
//! own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod client;
pub mod files;

pub use client::{ClientBuilder, ClientConfig};

/// Re-exports of [`docchat_core`] crate.
pub mod core {
    pub use docchat_core::*;
}

/// Re-exports of [`docchat_api`] crate.
pub mod api {
    pub use docchat_api::*;
}
