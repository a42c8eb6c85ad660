//! LSP infrastructure for vls
//!
//! - JSON-RPC 2.0 protocol types
//! - Content-Length framed transport
//! - Outbound message queue
//! - Capability negotiation

pub mod capabilities;
pub mod client;
pub mod protocol;
pub mod transport;

pub use capabilities::negotiate;
pub use client::Client;
pub use transport::{Transport, write_message};
