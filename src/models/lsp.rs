//! LSP Common Types
//!
//! Positions, ranges and locations shared by the protocol layer, the parser
//! and the symbol index.

use std::path::Path;

use serde::{Deserialize, Serialize};

// ============================================================================
// Core LSP Types
// ============================================================================

/// Position within a document (0-indexed, UTF-16 columns, LSP standard)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }

    /// Convert 0-indexed LSP position to 1-indexed display position
    pub fn to_display(&self) -> (u32, u32) {
        (self.line + 1, self.character + 1)
    }
}

/// Range within a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos <= self.end
    }
}

/// A range inside a specific document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

impl Location {
    pub fn new(uri: impl Into<String>, range: Range) -> Self {
        Self {
            uri: uri.into(),
            range,
        }
    }
}

// ============================================================================
// Offset <-> Position
// ============================================================================

/// Maps byte offsets of a source text to LSP positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, ch) in text.char_indices() {
            if ch == '\n' {
                line_starts.push(idx + ch.len_utf8());
            }
        }
        Self { line_starts }
    }

    /// Position of a byte offset. Columns are counted in UTF-16 code units.
    pub fn position(&self, text: &str, offset: usize) -> Position {
        let offset = offset.min(text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        let character = text
            .get(line_start..offset)
            .map(|prefix| prefix.encode_utf16().count())
            .unwrap_or(0);
        Position::new(line as u32, character as u32)
    }

    pub fn range(&self, text: &str, span: std::ops::Range<usize>) -> Range {
        Range::new(
            self.position(text, span.start),
            self.position(text, span.end),
        )
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

// ============================================================================
// URI helpers
// ============================================================================

pub fn path_to_uri(path: &Path) -> String {
    let abs_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };

    let path_str = abs_path.to_string_lossy();
    let encoded: String = path_str
        .chars()
        .map(|c| match c {
            '/' | '.' | '-' | '_' | '~' => c.to_string(),
            c if c.is_ascii_alphanumeric() => c.to_string(),
            c => {
                let mut buf = [0u8; 4];
                c.encode_utf8(&mut buf)
                    .bytes()
                    .map(|b| format!("%{:02X}", b))
                    .collect()
            }
        })
        .collect();

    if encoded.starts_with('/') {
        format!("file://{encoded}")
    } else {
        format!("file:///{encoded}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index_positions() {
        let text = "pub fn foo() {}\nstruct S {\n\tx int\n}\n";
        let index = LineIndex::new(text);
        assert_eq!(index.position(text, 0), Position::new(0, 0));
        assert_eq!(index.position(text, 7), Position::new(0, 7));
        let x = text.find("x int").unwrap();
        assert_eq!(index.position(text, x), Position::new(2, 1));
        assert_eq!(index.line_count(), 5);
    }

    #[test]
    fn test_line_index_counts_utf16_units() {
        let text = "// 😀 x\nfn y() {}";
        let index = LineIndex::new(text);
        let x = text.find('x').unwrap();
        // "// " = 3 units, emoji = 2 units, space = 1 unit
        assert_eq!(index.position(text, x), Position::new(0, 6));
    }

    #[test]
    fn test_path_to_uri_simple() {
        let uri = path_to_uri(Path::new("/tmp/vlib/builtin/string.v"));
        assert_eq!(uri, "file:///tmp/vlib/builtin/string.v");
    }

    #[test]
    fn test_path_to_uri_escapes() {
        let uri = path_to_uri(Path::new("/tmp/my project/main.v"));
        assert_eq!(uri, "file:///tmp/my%20project/main.v");
    }

    #[test]
    fn test_range_contains() {
        let range = Range::new(Position::new(1, 2), Position::new(1, 8));
        assert!(range.contains(Position::new(1, 5)));
        assert!(!range.contains(Position::new(2, 0)));
    }
}
