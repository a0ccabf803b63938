//! An out-of-the-box call relay that assembles the transcript reducer, tool
//! response submission, and the text messaging service.
//!
//! The crate includes a CLI tool for replaying recorded calls and chatting
//! in the terminal. And you can also use it as a library to bring the relay
//! into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod render;
mod session;

pub use session::{CallSession, CallSessionBuilder};

/// Re-exports of [`callrelay_core`] crate.
pub mod core {
    pub use callrelay_core::*;
}

/// Re-exports of [`callrelay_model`] crate.
pub mod model {
    pub use callrelay_model::*;
}
