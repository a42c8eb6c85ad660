//! Syntax tree, symbol table and parse scope

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use crate::models::lsp::Range;

/// Language a declaration is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    V,
    /// `fn C.puts(...)`, `struct C.FILE`
    C,
    /// `fn JS.console.log(...)`, `struct JS.Object`
    Js,
}

impl Language {
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "C" => Some(Self::C),
            "JS" => Some(Self::Js),
            _ => None,
        }
    }

    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            Self::V => None,
            Self::C => Some("C"),
            Self::Js => Some("JS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnDecl {
    pub name: String,
    pub is_pub: bool,
    pub is_method: bool,
    pub language: Language,
    /// Range of the name identifier
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    pub type_ref: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDecl {
    pub name: String,
    pub is_pub: bool,
    pub is_union: bool,
    pub language: Language,
    pub range: Range,
    pub fields: Vec<StructField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Fn(FnDecl),
    Struct(StructDecl),
    /// Anything the declaration parser skims over
    Other,
}

/// Top-level statements of one file
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub path: PathBuf,
    pub uri: String,
    pub module: String,
    pub stmts: Vec<Stmt>,
}

impl SyntaxTree {
    pub fn fns(&self) -> impl Iterator<Item = &FnDecl> {
        self.stmts.iter().filter_map(|stmt| match stmt {
            Stmt::Fn(decl) => Some(decl),
            _ => None,
        })
    }

    pub fn structs(&self) -> impl Iterator<Item = &StructDecl> {
        self.stmts.iter().filter_map(|stmt| match stmt {
            Stmt::Struct(decl) => Some(decl),
            _ => None,
        })
    }
}

// ============================================================================
// Table
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Primitive,
    Struct,
    /// Referenced before (or without) a declaration
    Placeholder,
}

const PRIMITIVES: &[&str] = &[
    "bool", "i8", "i16", "i32", "int", "i64", "isize", "u8", "byte", "u16", "u32", "u64",
    "usize", "f32", "f64", "rune", "char", "string", "voidptr", "byteptr", "charptr",
    "nil", "any", "float_literal", "int_literal", "thread",
];

/// Types and functions declared by the files parsed against it
#[derive(Debug, Clone)]
pub struct Table {
    types: HashMap<String, TypeKind>,
    fns: BTreeSet<String>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    pub fn new() -> Self {
        let types = PRIMITIVES
            .iter()
            .map(|name| (name.to_string(), TypeKind::Primitive))
            .collect();
        Self {
            types,
            fns: BTreeSet::new(),
        }
    }

    /// Look a type up, registering a placeholder if it is unknown
    pub fn find_or_register_type(&mut self, name: &str) -> TypeKind {
        *self
            .types
            .entry(name.to_string())
            .or_insert(TypeKind::Placeholder)
    }

    /// Register a declared struct, filling a placeholder of the same name
    pub fn register_struct(&mut self, name: &str) {
        self.types.insert(name.to_string(), TypeKind::Struct);
    }

    pub fn register_fn(&mut self, name: &str) {
        self.fns.insert(name.to_string());
    }

    pub fn type_kind(&self, name: &str) -> Option<TypeKind> {
        self.types.get(name).copied()
    }

    pub fn has_fn(&self, name: &str) -> bool {
        self.fns.contains(name)
    }

    /// Names still waiting for a declaration, sorted
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .types
            .iter()
            .filter(|(_, kind)| **kind == TypeKind::Placeholder)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn fn_count(&self) -> usize {
        self.fns.len()
    }

    /// Number of declared (non-primitive, non-placeholder) types
    pub fn struct_count(&self) -> usize {
        self.types
            .values()
            .filter(|kind| **kind == TypeKind::Struct)
            .count()
    }

    /// Drop everything except the primitives
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

// ============================================================================
// Parser scope
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub files: usize,
    pub fns: usize,
    pub structs: usize,
    pub faults: usize,
}

/// State shared by every file parsed in one run
#[derive(Debug, Clone, Default)]
pub struct ParserScope {
    pub module: String,
    pub stats: ParseStats,
}

impl ParserScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name as seen from outside the module; `builtin` and `main` are not prefixed
    pub fn qualify(&self, name: &str) -> String {
        match self.module.as_str() {
            "" | "builtin" | "main" => name.to_string(),
            module => format!("{module}.{name}"),
        }
    }
}
