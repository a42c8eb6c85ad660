//! Top-level declaration parser for V
//!
//! Recognizes `module`, function declarations and struct/union declarations
//! with their fields. Everything else is skimmed with bracket balancing, so
//! function bodies, consts, enums and interfaces cost one pass over their
//! tokens. Problems are reported as [`ParseFault`]s and never abort a file.

pub mod ast;
pub mod lexer;

use std::fmt;
use std::fs;
use std::ops::Range as Span;
use std::path::{Path, PathBuf};

use crate::models::lsp::{LineIndex, Range, path_to_uri};

pub use ast::{
    FnDecl, Language, ParseStats, ParserScope, Stmt, StructDecl, StructField, SyntaxTree, Table,
    TypeKind,
};
use lexer::Token;

/// A problem found while reading or parsing a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFault {
    pub file: PathBuf,
    pub range: Range,
    pub message: String,
}

impl fmt::Display for ParseFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (line, col) = self.range.start.to_display();
        write!(
            f,
            "{}:{}:{}: {}",
            self.file.display(),
            line,
            col,
            self.message
        )
    }
}

/// Receives parser faults as they happen
pub trait FaultHandler {
    fn on_fault(&mut self, fault: &ParseFault);
}

impl<F> FaultHandler for F
where
    F: FnMut(&ParseFault),
{
    fn on_fault(&mut self, fault: &ParseFault) {
        self(fault)
    }
}

/// Parse every file against one table and scope, in order.
///
/// Unreadable files are reported and produce no tree.
pub fn parse_files(
    files: &[PathBuf],
    table: &mut Table,
    scope: &mut ParserScope,
    faults: &mut dyn FaultHandler,
) -> Vec<SyntaxTree> {
    let mut trees = Vec::with_capacity(files.len());

    for path in files {
        match fs::read_to_string(path) {
            Ok(source) => trees.push(parse_source(path, &source, table, scope, faults)),
            Err(e) => {
                scope.stats.faults += 1;
                faults.on_fault(&ParseFault {
                    file: path.clone(),
                    range: Range::default(),
                    message: format!("cannot read file: {e}"),
                });
            }
        }
    }

    tracing::debug!(
        "Parsed {} files: {} fns, {} structs, {} faults",
        scope.stats.files,
        scope.stats.fns,
        scope.stats.structs,
        scope.stats.faults
    );

    trees
}

pub fn parse_source(
    path: &Path,
    source: &str,
    table: &mut Table,
    scope: &mut ParserScope,
    faults: &mut dyn FaultHandler,
) -> SyntaxTree {
    // A file without a `module` line is not qualified by the previous file's module
    scope.module.clear();
    let mut parser = Parser::new(path, source, table, scope, faults);
    let stmts = parser.parse();
    scope.stats.files += 1;

    SyntaxTree {
        path: path.to_path_buf(),
        uri: path_to_uri(path),
        module: scope.module.clone(),
        stmts,
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    path: &'a Path,
    source: &'a str,
    lines: LineIndex,
    tokens: Vec<(Token, Span<usize>)>,
    pos: usize,
    table: &'a mut Table,
    scope: &'a mut ParserScope,
    faults: &'a mut dyn FaultHandler,
}

impl<'a> Parser<'a> {
    fn new(
        path: &'a Path,
        source: &'a str,
        table: &'a mut Table,
        scope: &'a mut ParserScope,
        faults: &'a mut dyn FaultHandler,
    ) -> Self {
        let mut parser = Self {
            path,
            source,
            lines: LineIndex::new(source),
            tokens: Vec::new(),
            pos: 0,
            table,
            scope,
            faults,
        };

        for (token, span) in lexer::tokenize(source) {
            match token {
                Some(token) => parser.tokens.push((token, span)),
                None => {
                    let text = source.get(span.clone()).unwrap_or("?");
                    let message = format!("unexpected character `{text}`");
                    parser.fault(span, message);
                }
            }
        }

        parser
    }

    fn parse(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();

        while let Some(token) = self.skip_newlines() {
            let stmt = match token {
                Token::Module => self.parse_module(),
                Token::LBracket => {
                    self.skip_balanced();
                    continue;
                }
                Token::At if self.peek_at(1) == Some(Token::LBracket) => {
                    self.bump();
                    self.skip_balanced();
                    continue;
                }
                Token::Pub => {
                    self.bump();
                    match self.peek() {
                        Some(Token::Fn) => self.parse_fn(true),
                        Some(Token::Struct | Token::Union) => self.parse_struct(true),
                        _ => self.skip_statement(),
                    }
                }
                Token::Fn => self.parse_fn(false),
                Token::Struct | Token::Union => self.parse_struct(false),
                _ => self.skip_statement(),
            };
            stmts.push(stmt);
        }

        stmts
    }

    fn parse_module(&mut self) -> Stmt {
        self.bump();
        if let Some((Token::Ident, span)) = self.peek_spanned() {
            self.scope.module = self.source[span].to_string();
        } else {
            self.fault_here("expected module name");
        }
        self.skip_statement()
    }

    // ------------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------------

    fn parse_fn(&mut self, is_pub: bool) -> Stmt {
        self.bump(); // fn

        let is_method = self.peek() == Some(Token::LParen);
        if is_method {
            self.skip_balanced();
        }

        let Some((language, name, span)) = self.parse_decl_name(is_method) else {
            self.fault_here("expected function name");
            return self.skip_statement();
        };

        if self.peek() == Some(Token::LBracket) {
            self.skip_balanced(); // generic parameters
        }

        // Signature, then an optional body
        while let Some(token) = self.peek() {
            match token {
                Token::Newline => break,
                Token::LBrace => {
                    self.skip_balanced();
                    break;
                }
                t if t.is_open() => self.skip_balanced(),
                t if t.is_close() => break,
                _ => self.bump(),
            }
        }

        let qualified = self.qualify(language, &name);
        if !is_method {
            self.table.register_fn(&qualified);
        }
        self.scope.stats.fns += 1;

        Stmt::Fn(FnDecl {
            name: qualified,
            is_pub,
            is_method,
            language,
            range: self.range(span),
        })
    }

    /// Name after `fn`, `fn (recv)` or `struct`, including the `C.`/`JS.`
    /// prefix of foreign declarations and operator names of overloads.
    fn parse_decl_name(&mut self, allow_operator: bool) -> Option<(Language, String, Span<usize>)> {
        let source = self.source;
        let (token, span) = self.peek_spanned()?;

        if allow_operator && matches!(token, Token::Op | Token::Eq) {
            let start = span.start;
            let mut end = span.end;
            while let Some((Token::Op | Token::Eq, next)) = self.peek_spanned() {
                end = next.end;
                self.bump();
            }
            return Some((Language::V, source[start..end].to_string(), start..end));
        }

        if !token.is_name() {
            return None;
        }
        self.bump();

        let text = &source[span.clone()];
        if let Some(language) = Language::from_prefix(text)
            && self.peek() == Some(Token::Dot)
        {
            self.bump();
            let (first, mut last) = match self.peek_spanned() {
                Some((t, s)) if t.is_name() => (s.start, s.end),
                _ => return None,
            };
            self.bump();
            // `JS.console.log`
            while self.peek() == Some(Token::Dot) && self.peek_at(1).is_some_and(|t| t.is_name()) {
                self.bump();
                if let Some((_, s)) = self.peek_spanned() {
                    last = s.end;
                }
                self.bump();
            }
            return Some((language, source[first..last].to_string(), first..last));
        }

        Some((Language::V, text.to_string(), span))
    }

    // ------------------------------------------------------------------------
    // Structs
    // ------------------------------------------------------------------------

    fn parse_struct(&mut self, is_pub: bool) -> Stmt {
        let is_union = self.peek() == Some(Token::Union);
        self.bump();

        let Some((language, name, span)) = self.parse_decl_name(false) else {
            self.fault_here("expected struct name");
            return self.skip_statement();
        };

        if self.peek() == Some(Token::LBracket) {
            self.skip_balanced();
        }

        let qualified = self.qualify(language, &name);
        self.table.register_struct(&qualified);
        self.scope.stats.structs += 1;

        let fields = if self.peek() == Some(Token::LBrace) {
            self.parse_fields()
        } else {
            self.skip_statement();
            Vec::new()
        };

        Stmt::Struct(StructDecl {
            name: qualified,
            is_pub,
            is_union,
            language,
            range: self.range(span),
            fields,
        })
    }

    fn parse_fields(&mut self) -> Vec<StructField> {
        let open = self.bump_spanned();
        let mut fields = Vec::new();

        loop {
            let Some(token) = self.skip_newlines() else {
                self.fault(open, "unclosed `{`".to_string());
                break;
            };

            match token {
                Token::RBrace => {
                    self.bump();
                    break;
                }
                // `pub:`, `mut:`, `pub mut:`, `__global:`
                Token::Pub | Token::Mut | Token::Ident if self.is_access_modifier() => {
                    while self.peek() != Some(Token::Colon) {
                        self.bump();
                    }
                    self.bump();
                }
                t if t.is_name() => {
                    if let Some(field) = self.parse_field() {
                        fields.push(field);
                    }
                }
                // Attributes on their own line
                Token::LBracket => self.skip_balanced(),
                Token::At if self.peek_at(1) == Some(Token::LBracket) => {
                    self.bump();
                    self.skip_balanced();
                }
                _ => {
                    self.fault_here("unexpected token in struct body");
                    self.skip_field_rest();
                }
            }
        }

        fields
    }

    fn is_access_modifier(&self) -> bool {
        let mut offset = 0;
        while let Some(token) = self.peek_at(offset) {
            match token {
                Token::Colon => return offset > 0,
                Token::Pub | Token::Mut => offset += 1,
                Token::Ident if self.text_at(offset) == Some("__global") => offset += 1,
                _ => return false,
            }
        }
        false
    }

    fn parse_field(&mut self) -> Option<StructField> {
        let (_, name_span) = self.bump_spanned_token()?;

        // Embedded struct: a lone type name
        if matches!(self.peek(), None | Some(Token::Newline | Token::RBrace)) {
            let embedded = self.source[name_span].to_string();
            self.resolve_type(&embedded);
            return None;
        }
        if self.peek() == Some(Token::Dot) {
            // Embedded `module.Type`
            self.skip_field_rest();
            return None;
        }

        let type_start = self.peek_spanned().map(|(_, s)| s.start)?;
        let mut type_end = type_start;
        let mut type_tokens = 0usize;

        while let Some((token, span)) = self.peek_spanned() {
            let attribute = token == Token::LBracket && type_tokens > 0 && span.start > type_end;
            if attribute || matches!(token, Token::Newline | Token::RBrace | Token::Eq) {
                break;
            }
            if token.is_open() {
                self.skip_balanced();
                type_end = self.prev_end();
            } else if token.is_close() {
                break;
            } else {
                self.bump();
                type_end = span.end;
            }
            type_tokens += 1;
        }

        // Default value and attributes
        self.skip_field_rest();

        let type_ref = self.source[type_start..type_end].trim().to_string();
        if let Some(base) = base_type(&type_ref) {
            self.resolve_type(base);
        }

        Some(StructField {
            name: self.source[name_span.clone()].to_string(),
            type_ref,
            range: self.range(name_span),
        })
    }

    fn resolve_type(&mut self, name: &str) {
        let qualified = match name.split_once('.') {
            Some((prefix, _)) if Language::from_prefix(prefix).is_some() => name.to_string(),
            Some(_) => name.to_string(),
            None if name.starts_with(|c: char| c.is_ascii_uppercase()) => {
                self.scope.qualify(name)
            }
            None => name.to_string(),
        };
        self.table.find_or_register_type(&qualified);
    }

    /// Skip to the end of the field line without consuming the closing brace
    fn skip_field_rest(&mut self) {
        while let Some(token) = self.peek() {
            match token {
                Token::Newline => {
                    self.bump();
                    break;
                }
                Token::RBrace => break,
                t if t.is_open() => self.skip_balanced(),
                _ => self.bump(),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Skimming
    // ------------------------------------------------------------------------

    /// Skip one top-level statement: everything up to a newline outside brackets
    fn skip_statement(&mut self) -> Stmt {
        while let Some((token, span)) = self.peek_spanned() {
            match token {
                Token::Newline => {
                    self.bump();
                    break;
                }
                t if t.is_open() => self.skip_balanced(),
                t if t.is_close() => {
                    let message = format!("unmatched `{}`", &self.source[span.clone()]);
                    self.fault(span, message);
                    self.bump();
                }
                _ => self.bump(),
            }
        }
        Stmt::Other
    }

    /// Skip an opening delimiter through its matching close
    fn skip_balanced(&mut self) {
        let Some((open, open_span)) = self.peek_spanned() else {
            return;
        };
        self.bump();
        let mut stack = vec![open];

        while let Some(top) = stack.last().copied() {
            let Some((token, span)) = self.peek_spanned() else {
                let message = format!("unclosed `{}`", &self.source[open_span.clone()]);
                self.fault(open_span, message);
                return;
            };
            self.bump();

            if token.is_open() {
                stack.push(token);
            } else if token.is_close() {
                if closes(top, token) {
                    stack.pop();
                } else {
                    let message = format!("mismatched `{}`", &self.source[span.clone()]);
                    self.fault(span, message);
                    // Recover by closing the innermost delimiter anyway
                    stack.pop();
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Cursor
    // ------------------------------------------------------------------------

    fn peek(&self) -> Option<Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| *t)
    }

    fn peek_spanned(&self) -> Option<(Token, Span<usize>)> {
        self.tokens.get(self.pos).cloned()
    }

    fn text_at(&self, offset: usize) -> Option<&str> {
        self.tokens
            .get(self.pos + offset)
            .map(|(_, span)| &self.source[span.clone()])
    }

    fn bump(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn bump_spanned_token(&mut self) -> Option<(Token, Span<usize>)> {
        let next = self.peek_spanned()?;
        self.bump();
        Some(next)
    }

    fn bump_spanned(&mut self) -> Span<usize> {
        self.bump_spanned_token()
            .map(|(_, span)| span)
            .unwrap_or_else(|| self.source.len()..self.source.len())
    }

    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |(_, span)| span.end)
    }

    fn skip_newlines(&mut self) -> Option<Token> {
        while self.peek() == Some(Token::Newline) {
            self.bump();
        }
        self.peek()
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn qualify(&self, language: Language, name: &str) -> String {
        match language.prefix() {
            Some(prefix) => format!("{prefix}.{name}"),
            None => self.scope.qualify(name),
        }
    }

    fn range(&self, span: Span<usize>) -> Range {
        self.lines.range(self.source, span)
    }

    fn fault_here(&mut self, message: &str) {
        let span = self
            .peek_spanned()
            .map(|(_, s)| s)
            .unwrap_or_else(|| self.source.len()..self.source.len());
        self.fault(span, message.to_string());
    }

    fn fault(&mut self, span: Span<usize>, message: String) {
        self.scope.stats.faults += 1;
        let fault = ParseFault {
            file: self.path.to_path_buf(),
            range: self.range(span),
            message,
        };
        self.faults.on_fault(&fault);
    }
}

fn closes(open: Token, close: Token) -> bool {
    matches!(
        (open, close),
        (Token::LParen, Token::RParen)
            | (Token::LBrace, Token::RBrace)
            | (Token::LBracket, Token::RBracket)
    )
}

/// Named type at the core of a type reference: `&[]Foo` -> `Foo`,
/// `map[string]Bar` -> `Bar`, `?C.FILE` -> `C.FILE`. Function types have none.
fn base_type(type_ref: &str) -> Option<&str> {
    let trimmed = type_ref.trim();
    if trimmed.starts_with("fn") && !trimmed[2..].starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let start = trimmed
        .char_indices()
        .rfind(|&(_, c)| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .map_or(0, |(i, c)| i + c.len_utf8());
    let base = &trimmed[start..];
    (!base.is_empty() && !base.starts_with(|c: char| c.is_ascii_digit())).then_some(base)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    fn parse(source: &str) -> (SyntaxTree, Table, Vec<ParseFault>) {
        let mut table = Table::new();
        let mut scope = ParserScope::new();
        let faults = RefCell::new(Vec::new());
        let mut handler = |f: &ParseFault| faults.borrow_mut().push(f.clone());
        let tree = parse_source(
            Path::new("/vlib/builtin/x.v"),
            source,
            &mut table,
            &mut scope,
            &mut handler,
        );
        (tree, table, faults.into_inner())
    }

    #[test]
    fn test_functions() {
        let source = "\
module builtin

pub fn foo() {}
fn bar(x int) string {
\treturn '}'
}
fn (s string) len2() int { return s.len }
pub fn (a Vec) + (b Vec) Vec { return a }
fn C.printf(fmt &char, ...) int
pub fn JS.console.log(args ...any)
[inline]
@[direct_array_access]
pub fn generic[T](x T) T { return x }
";
        let (tree, table, faults) = parse(source);
        assert!(faults.is_empty(), "{faults:?}");
        assert_eq!(tree.module, "builtin");

        let fns: Vec<(&str, bool, bool, Language)> = tree
            .fns()
            .map(|f| (f.name.as_str(), f.is_pub, f.is_method, f.language))
            .collect();
        assert_eq!(
            fns,
            [
                ("foo", true, false, Language::V),
                ("bar", false, false, Language::V),
                ("len2", false, true, Language::V),
                ("+", true, true, Language::V),
                ("C.printf", false, false, Language::C),
                ("JS.console.log", true, false, Language::Js),
                ("generic", true, false, Language::V),
            ]
        );
        assert!(table.has_fn("foo"));
        assert!(!table.has_fn("len2"));

        let foo = tree.fns().next().unwrap();
        assert_eq!(foo.range.start, crate::models::lsp::Position::new(2, 7));
        assert_eq!(foo.range.end, crate::models::lsp::Position::new(2, 10));
    }

    #[test]
    fn test_struct_fields() {
        let source = "\
pub struct Array {
\tdata voidptr
pub:
\tlen int // length
\tcap int = 4
pub mut:
\tflags ArrayFlags [json: 'f']
\telems []&Elem
\tm map[string]int
\tcb fn (int) bool
}
struct S{ x int }
struct C.FILE {}
union U {
\ti int
\tf f64
}
";
        let (tree, table, faults) = parse(source);
        assert!(faults.is_empty(), "{faults:?}");

        let structs: Vec<&StructDecl> = tree.structs().collect();
        assert_eq!(structs.len(), 4);

        let array = structs[0];
        assert!(array.is_pub);
        let fields: Vec<(&str, &str)> = array
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.type_ref.as_str()))
            .collect();
        assert_eq!(
            fields,
            [
                ("data", "voidptr"),
                ("len", "int"),
                ("cap", "int"),
                ("flags", "ArrayFlags"),
                ("elems", "[]&Elem"),
                ("m", "map[string]int"),
                ("cb", "fn (int) bool"),
            ]
        );

        let s = structs[1];
        assert_eq!(s.name, "S");
        assert_eq!(s.fields.len(), 1);
        assert_eq!(s.fields[0].name, "x");

        assert_eq!(structs[2].name, "C.FILE");
        assert_eq!(structs[2].language, Language::C);
        assert!(structs[3].is_union);

        assert_eq!(table.placeholders(), ["ArrayFlags", "Elem"]);
        assert_eq!(table.type_kind("Array"), Some(TypeKind::Struct));
    }

    #[test]
    fn test_skims_other_declarations() {
        let source = "\
import strings
const (
\tmax_len = 10
)
enum Color {
\tred
\tgreen
}
$if windows {
\t#include <windows.h>
}
interface Speaker {
\tspeak() string
}
type Alias = int | string
pub fn after() {}
";
        let (tree, _, faults) = parse(source);
        assert!(faults.is_empty(), "{faults:?}");
        let names: Vec<&str> = tree.fns().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["after"]);
        assert_eq!(tree.structs().count(), 0);
    }

    #[test]
    fn test_faults_do_not_abort() {
        let source = "fn 123() {}\npub fn ok() {}\nfn unclosed() {\n";
        let (tree, _, faults) = parse(source);
        assert!(!faults.is_empty());
        assert!(faults.iter().any(|f| f.message == "expected function name"));
        assert!(faults.iter().any(|f| f.message.starts_with("unclosed")));
        assert!(tree.fns().any(|f| f.name == "ok"));
    }

    #[test]
    fn test_module_qualification() {
        let (tree, table, _) = parse("module strings\npub struct Builder {}\npub fn new() {}\n");
        assert_eq!(tree.module, "strings");
        assert_eq!(tree.structs().next().unwrap().name, "strings.Builder");
        assert!(table.has_fn("strings.new"));
    }

    #[test]
    fn test_parse_files_reports_unreadable() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("a.v");
        fs::write(&good, "pub fn a() {}\n").unwrap();
        let missing = dir.path().join("missing.v");

        let mut table = Table::new();
        let mut scope = ParserScope::new();
        let mut seen = Vec::new();
        let mut handler = |f: &ParseFault| seen.push(f.message.clone());
        let trees = parse_files(
            &[missing, good],
            &mut table,
            &mut scope,
            &mut handler,
        );

        assert_eq!(trees.len(), 1);
        assert_eq!(scope.stats.files, 1);
        assert_eq!(scope.stats.faults, 1);
        assert!(seen[0].starts_with("cannot read file"));
    }

    #[test]
    fn test_base_type() {
        assert_eq!(base_type("&[]Foo"), Some("Foo"));
        assert_eq!(base_type("map[string]Bar"), Some("Bar"));
        assert_eq!(base_type("?C.FILE"), Some("C.FILE"));
        assert_eq!(base_type("[4]u8"), Some("u8"));
        assert_eq!(base_type("fn (int) bool"), None);
        assert_eq!(base_type("fnptr"), Some("fnptr"));
        assert_eq!(base_type("Foo→Bar"), Some("Bar"));
        assert_eq!(base_type("[]→"), None);
    }

    #[test]
    fn test_non_ascii_punctuation_in_field_type() {
        let (tree, _, faults) = parse("struct S {\n\tx Foo→Bar\n}\npub fn after() {}\n");

        assert_eq!(faults.len(), 1);
        assert!(faults[0].message.contains('→'), "{:?}", faults[0]);
        let s = tree.structs().next().unwrap();
        assert_eq!(s.fields.len(), 1);
        assert_eq!(s.fields[0].name, "x");
        assert!(tree.fns().any(|f| f.name == "after"));
    }

    #[test]
    fn test_module_does_not_leak_between_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = dir.path().join("a.v");
        let second = dir.path().join("b.v");
        fs::write(&first, "module strings\npub fn a() {}\n").unwrap();
        fs::write(&second, "pub fn b() {}\n").unwrap();

        let mut table = Table::new();
        let mut scope = ParserScope::new();
        let mut handler = |_: &ParseFault| {};
        let trees = parse_files(&[first, second], &mut table, &mut scope, &mut handler);

        assert_eq!(trees[0].module, "strings");
        assert_eq!(trees[1].module, "");
        assert!(table.has_fn("strings.a"));
        assert!(table.has_fn("b"));
        assert!(!table.has_fn("strings.b"));
    }
}
