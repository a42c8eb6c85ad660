//! Builtin module indexer
//!
//! Parses every applicable file of `vlib/builtin` against the shared base
//! table and records where public functions, structs and struct fields are
//! declared. Runs once, synchronously, while the session initializes.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::IndexError;
use crate::infra::build_config::BuildConfig;
use crate::infra::parser::{self, FaultHandler, Language, ParserScope, Stmt, SyntaxTree, Table};
use crate::models::config::{IndexingMode, VlsConfig};
use crate::models::symbol::{BuiltinSymbolEntry, SymbolIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexState {
    #[default]
    NotStarted,
    Running,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub state: IndexState,
    pub files_indexed: usize,
    /// Index writes, including overwrites
    pub symbols: usize,
    pub faults: usize,
}

impl IndexReport {
    pub fn aborted() -> Self {
        Self {
            state: IndexState::Aborted,
            files_indexed: 0,
            symbols: 0,
            faults: 0,
        }
    }
}

pub struct BuiltinIndexer {
    mode: IndexingMode,
    build: BuildConfig,
    vroot: Option<PathBuf>,
    state: IndexState,
}

impl BuiltinIndexer {
    pub fn new(mode: IndexingMode, build: BuildConfig, vroot: Option<PathBuf>) -> Self {
        Self {
            mode,
            build,
            vroot,
            state: IndexState::NotStarted,
        }
    }

    pub fn from_config(config: &VlsConfig) -> Self {
        let build = match &config.target_os {
            Some(os) => BuildConfig::for_os(os),
            None => BuildConfig::host(),
        };
        Self::new(config.indexing, build, resolve_vroot(config.vroot.as_deref()))
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn mode(&self) -> IndexingMode {
        self.mode
    }

    /// `<vroot>/vlib/builtin`
    pub fn builtin_dir(&self) -> Result<PathBuf, IndexError> {
        self.vroot
            .as_ref()
            .map(|root| root.join("vlib").join("builtin"))
            .ok_or(IndexError::VrootNotFound)
    }

    /// Index the builtin module into `index` and `builtin_names`.
    ///
    /// Enumeration failures abort the run and are returned; faults inside
    /// individual files go to `faults` and the run continues.
    pub fn run(
        &mut self,
        table: &mut Table,
        index: &mut SymbolIndex,
        builtin_names: &mut Vec<String>,
        faults: &mut dyn FaultHandler,
    ) -> Result<IndexReport, IndexError> {
        self.state = IndexState::Running;

        let files = match self.builtin_dir().and_then(|dir| enumerate(&dir)) {
            Ok(files) => files,
            Err(e) => {
                self.state = IndexState::Aborted;
                return Err(e);
            }
        };

        let selected = self.build.select_files(&files);
        tracing::debug!(
            "Builtin module: {} files, {} selected for {}",
            files.len(),
            selected.len(),
            self.build.target_os
        );

        let mut scope = ParserScope::new();
        let trees = parser::parse_files(&selected, table, &mut scope, faults);

        let symbols = match self.mode {
            IndexingMode::Production => trees
                .iter()
                .map(|tree| collect(tree, index, builtin_names))
                .sum::<usize>(),
            IndexingMode::Deterministic => 0,
        };

        self.state = IndexState::Completed;

        let report = IndexReport {
            state: self.state,
            files_indexed: trees.len(),
            symbols,
            faults: scope.stats.faults,
        };
        tracing::info!(
            "Indexed {} builtin files: {} symbols, {} faults",
            report.files_indexed,
            report.symbols,
            report.faults
        );

        Ok(report)
    }
}

/// Configured root, else the directory holding the `v` executable on PATH
pub fn resolve_vroot(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(root) = configured {
        return Some(root.to_path_buf());
    }

    let exe = which::which("v").ok()?;
    // `v` is usually a symlink into the installation
    let exe = std::fs::canonicalize(&exe).unwrap_or(exe);
    exe.parent().map(Path::to_path_buf)
}

/// Files directly inside the builtin directory, sorted by name
fn enumerate(dir: &Path) -> Result<Vec<PathBuf>, IndexError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| IndexError::Enumerate {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Record the indexable declarations of one file; returns the number of writes
fn collect(tree: &SyntaxTree, index: &mut SymbolIndex, builtin_names: &mut Vec<String>) -> usize {
    let mut writes = 0;
    let entry = |range| BuiltinSymbolEntry::new(tree.uri.clone(), range);

    for stmt in &tree.stmts {
        match stmt {
            Stmt::Fn(decl) if decl.is_pub && !decl.is_method => {
                builtin_names.push(decl.name.clone());
                index.insert(decl.name.clone(), entry(decl.range));
                writes += 1;
            }
            Stmt::Struct(decl) if decl.language == Language::V => {
                index.insert(decl.name.clone(), entry(decl.range));
                writes += 1;
                for field in &decl.fields {
                    index.insert(format!("{}.{}", decl.name, field.name), entry(field.range));
                    writes += 1;
                }
            }
            _ => {}
        }
    }

    writes
}
