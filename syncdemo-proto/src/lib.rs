//! Shared protocol definitions for the `SyncDemo` wire format.

pub mod codec;
pub mod message;
