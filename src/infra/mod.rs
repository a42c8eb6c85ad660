//! Infrastructure layer for vls
//!
//! Contains low-level implementations and external integrations.

pub mod build_config;
pub mod logging;
pub mod lsp;
pub mod parser;
