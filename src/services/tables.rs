//! Ownership of parse/type tables
//!
//! One base table holds the builtin module. Each workspace root gets its own
//! table. Everything is released together when the session exits.

use std::collections::BTreeMap;

use crate::infra::parser::Table;

/// Identifies a released table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableKey {
    Workspace(String),
    Base,
}

#[derive(Debug, Default)]
pub struct TableRegistry {
    base: Table,
    workspaces: BTreeMap<String, Table>,
    released: bool,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(&self) -> &Table {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut Table {
        &mut self.base
    }

    /// Table for a workspace root, created empty on first use
    pub fn register_workspace(&mut self, key: impl Into<String>) -> &mut Table {
        self.workspaces.entry(key.into()).or_default()
    }

    pub fn workspace(&self, key: &str) -> Option<&Table> {
        self.workspaces.get(key)
    }

    pub fn workspace_count(&self) -> usize {
        self.workspaces.len()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Free every workspace table, then the base table.
    ///
    /// Returns the keys in release order. A second call releases nothing.
    pub fn release_all(&mut self) -> Vec<TableKey> {
        if self.released {
            return Vec::new();
        }

        let mut order: Vec<TableKey> = std::mem::take(&mut self.workspaces)
            .into_keys()
            .map(TableKey::Workspace)
            .collect();

        self.base.clear();
        order.push(TableKey::Base);
        self.released = true;

        tracing::debug!("Released {} tables", order.len());
        order
    }
}
