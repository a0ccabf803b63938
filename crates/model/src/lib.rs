//! Wire types shared by the call relay crates.
//!
//! This crate describes the realtime protocol spoken by the voice-call
//! server (inbound [`ServerEvent`]s and outbound [`ClientEvent`]s), the
//! [`ConversationItem`]s a transcript is made of, and the contract that
//! AI completion providers implement.
//!
//! Types in this crate don't define any behavior beyond decoding and
//! encoding. The transcript reduction lives in `callrelay-core`.

#![deny(missing_docs)]

mod client;
mod error;
mod event;
mod item;
mod provider;

pub use client::*;
pub use error::*;
pub use event::*;
pub use item::*;
pub use provider::*;
