//! Build-configuration file selection
//!
//! V picks platform- and backend-specific sources by file name:
//! `foo_linux.c.v`, `foo_nix.c.v`, `foo_default.c.v`, `foo.js.v`,
//! `foo_d_flag.v`. This module selects the subset that applies to one
//! target.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const SOURCE_EXTENSION: &str = "v";

const TEST_SUFFIX: &str = "_test";
const DEFAULT_SUFFIX: &str = "_default";

/// Code generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    C,
    Js,
    Wasm,
    Native,
}

impl Backend {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "c" => Some(Self::C),
            "js" => Some(Self::Js),
            "wasm" => Some(Self::Wasm),
            "native" => Some(Self::Native),
            _ => None,
        }
    }
}

/// Target description used to select files
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// OS name as reported by `std::env::consts::OS`
    pub target_os: String,
    pub backend: Backend,
    /// Names enabled with `-d`
    pub defines: HashSet<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::host()
    }
}

/// Classification of a single file name
#[derive(Debug, PartialEq, Eq)]
enum Selection {
    Excluded,
    Included,
    /// `_default` file: included unless an OS-specific sibling was selected
    Fallback { base: String },
}

impl BuildConfig {
    pub fn host() -> Self {
        Self::for_os(std::env::consts::OS)
    }

    pub fn for_os(os: impl Into<String>) -> Self {
        Self {
            target_os: os.into().to_lowercase(),
            backend: Backend::C,
            defines: HashSet::new(),
        }
    }

    pub fn with_define(mut self, name: impl Into<String>) -> Self {
        self.defines.insert(name.into());
        self
    }

    /// Select the files that belong to this build, preserving input order
    pub fn select_files(&self, files: &[PathBuf]) -> Vec<PathBuf> {
        let classified: Vec<(&PathBuf, Selection)> =
            files.iter().map(|f| (f, self.classify(f))).collect();

        // Bases that already have an OS-specific file for this target
        let covered: HashSet<String> = classified
            .iter()
            .filter(|(_, sel)| *sel == Selection::Included)
            .filter_map(|(path, _)| self.os_specific_base(path))
            .collect();

        classified
            .into_iter()
            .filter_map(|(path, sel)| match sel {
                Selection::Included => Some(path.clone()),
                Selection::Fallback { base } if !covered.contains(&base) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn should_include(&self, path: &Path) -> bool {
        self.classify(path) != Selection::Excluded
    }

    fn classify(&self, path: &Path) -> Selection {
        let Some(stem) = source_stem(path) else {
            return Selection::Excluded;
        };
        if stem.ends_with(TEST_SUFFIX) {
            return Selection::Excluded;
        }

        let stem = match stem.rsplit_once('.') {
            Some((rest, suffix)) => match Backend::from_suffix(suffix) {
                Some(backend) if backend == self.backend => rest,
                Some(_) => return Selection::Excluded,
                None => stem,
            },
            None => stem,
        };

        if let Some((_, flag)) = stem.rsplit_once("_notd_") {
            return if self.defines.contains(flag) {
                Selection::Excluded
            } else {
                Selection::Included
            };
        }
        if let Some((_, flag)) = stem.rsplit_once("_d_") {
            return if self.defines.contains(flag) {
                Selection::Included
            } else {
                Selection::Excluded
            };
        }

        if let Some(base) = stem.strip_suffix(DEFAULT_SUFFIX) {
            return Selection::Fallback {
                base: base.to_string(),
            };
        }

        match os_suffix(stem) {
            Some((_, os)) if !self.matches_os(os) => Selection::Excluded,
            _ => Selection::Included,
        }
    }

    fn os_specific_base(&self, path: &Path) -> Option<String> {
        let stem = source_stem(path)?;
        let stem = stem
            .rsplit_once('.')
            .filter(|(_, suffix)| Backend::from_suffix(suffix).is_some())
            .map_or(stem, |(rest, _)| rest);
        os_suffix(stem).map(|(base, _)| base.to_string())
    }

    fn matches_os(&self, os: &str) -> bool {
        let target = self.target_os.as_str();
        match os {
            "nix" => target != "windows",
            "bsd" => matches!(target, "freebsd" | "openbsd" | "netbsd" | "dragonfly"),
            "macos" | "darwin" => target == "macos",
            other => other == target,
        }
    }
}

const OS_SUFFIXES: &[&str] = &[
    "linux", "windows", "macos", "darwin", "freebsd", "openbsd", "netbsd", "dragonfly",
    "android", "ios", "solaris", "qnx", "haiku", "serenity", "nix", "bsd",
];

/// File name without `.v`, if the path is a V source
fn source_stem(path: &Path) -> Option<&str> {
    if path.extension()? != SOURCE_EXTENSION {
        return None;
    }
    path.file_stem()?.to_str()
}

/// Split `base_os` into `(base, os)` when `os` names a platform
fn os_suffix(stem: &str) -> Option<(&str, &str)> {
    let (base, os) = stem.rsplit_once('_')?;
    OS_SUFFIXES.contains(&os).then_some((base, os))
}
