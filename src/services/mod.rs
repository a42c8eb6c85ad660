//! Service layer for vls

pub mod config;
pub mod indexer;
pub mod session;
pub mod tables;

pub use config::{ConfigService, DefaultConfigService};
pub use indexer::{BuiltinIndexer, IndexReport, IndexState};
pub use session::{SessionController, SessionState};
pub use tables::{TableKey, TableRegistry};
