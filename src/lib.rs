//! vls - language server core for V
//!
//! Session lifecycle, capability negotiation, session logging and the
//! builtin symbol index that later language features resolve against.

pub mod app;
pub mod cli;
pub mod error;
pub mod infra;
pub mod models;
pub mod server;
pub mod services;

pub use error::{VlsError, VlsResult};
