//! # banter-core
//!
//! Shared vocabulary for the banter chat relay.
//!
//! - **Domain types**: [`User`] and [`ChatMessage`] values as they travel on the wire
//! - **Envelopes**: tagged [`Inbound`]/[`Outbound`] unions with a validating decoder
//! - **IDs**: prefixed UUID v7 generators
//! - **Store contract**: the [`ChatStore`] trait the dispatch core persists through

#![deny(unsafe_code)]

pub mod envelope;
pub mod ids;
pub mod store;
pub mod types;

pub use envelope::{Inbound, Outbound, ProtocolError, decode};
pub use store::{ChatStore, StoreError};
pub use types::{ChatMessage, User};
