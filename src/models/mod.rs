//! Data models for vls
//!
//! Contains core type definitions used throughout the server.

pub mod config;
pub mod lsp;
pub mod symbol;

// Re-export commonly used types
pub use config::{FeatureFlag, FeatureSet, IndexingMode, VlsConfig};
pub use lsp::{LineIndex, Location, Position, Range};
pub use symbol::{BuiltinSymbolEntry, SymbolIndex};
