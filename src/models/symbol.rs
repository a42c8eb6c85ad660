//! Builtin symbol index
//!
//! Maps qualified declaration names (`println`, `string`, `string.len`) to the
//! location where the builtin module declares them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::lsp::{Location, Range};

/// Where a builtin declaration lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinSymbolEntry {
    pub uri: String,
    pub range: Range,
}

impl BuiltinSymbolEntry {
    pub fn new(uri: impl Into<String>, range: Range) -> Self {
        Self {
            uri: uri.into(),
            range,
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.uri.clone(), self.range)
    }
}

/// Qualified name -> declaration location.
///
/// Writes are last-write-wins per key; a name declared twice keeps the
/// location seen last in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolIndex {
    entries: HashMap<String, BuiltinSymbolEntry>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: BuiltinSymbolEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinSymbolEntry> {
        self.entries.get(name)
    }

    /// Location of a struct field, keyed as `<struct>.<field>`
    pub fn field(&self, struct_name: &str, field_name: &str) -> Option<&BuiltinSymbolEntry> {
        self.entries.get(&format!("{struct_name}.{field_name}"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BuiltinSymbolEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::lsp::Position;

    fn entry(line: u32) -> BuiltinSymbolEntry {
        BuiltinSymbolEntry::new(
            "file:///vlib/builtin/builtin.v",
            Range::new(Position::new(line, 0), Position::new(line, 3)),
        )
    }

    #[test]
    fn test_last_write_wins() {
        let mut index = SymbolIndex::new();
        index.insert("foo", entry(1));
        index.insert("foo", entry(7));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("foo").unwrap().range.start.line, 7);
    }

    #[test]
    fn test_field_lookup() {
        let mut index = SymbolIndex::new();
        index.insert("string.len", entry(3));
        assert!(index.field("string", "len").is_some());
        assert!(index.field("string", "str").is_none());
    }

    #[test]
    fn test_location_conversion() {
        let loc = entry(2).location();
        assert_eq!(loc.uri, "file:///vlib/builtin/builtin.v");
        assert_eq!(loc.range.start, Position::new(2, 0));
    }
}
