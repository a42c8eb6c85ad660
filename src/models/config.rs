//! Configuration model for vls

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Optional language features that can be advertised to the client
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum FeatureFlag {
    Completion,
    Hover,
    Definition,
    FoldingRange,
    DocumentSymbol,
    WorkspaceSymbol,
    Formatting,
    SignatureHelp,
}

impl FeatureFlag {
    pub const ALL: [FeatureFlag; 8] = [
        Self::Completion,
        Self::Hover,
        Self::Definition,
        Self::FoldingRange,
        Self::DocumentSymbol,
        Self::WorkspaceSymbol,
        Self::Formatting,
        Self::SignatureHelp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::Hover => "hover",
            Self::Definition => "definition",
            Self::FoldingRange => "folding_range",
            Self::DocumentSymbol => "document_symbol",
            Self::WorkspaceSymbol => "workspace_symbol",
            Self::Formatting => "formatting",
            Self::SignatureHelp => "signature_help",
        }
    }
}

/// Set of enabled features
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeSet<FeatureFlag>);

impl FeatureSet {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn all() -> Self {
        FeatureFlag::ALL.into_iter().collect()
    }

    pub fn contains(&self, flag: FeatureFlag) -> bool {
        self.0.contains(&flag)
    }

    pub fn enable(&mut self, flag: FeatureFlag) {
        self.0.insert(flag);
    }

    pub fn disable(&mut self, flag: FeatureFlag) {
        self.0.remove(&flag);
    }

    pub fn iter(&self) -> impl Iterator<Item = FeatureFlag> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<FeatureFlag> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = FeatureFlag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Whether the builtin indexer collects symbols.
///
/// `Deterministic` parses the builtin module but leaves the index empty so
/// fixtures that snapshot server output stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingMode {
    #[default]
    Production,
    Deterministic,
}

/// vls configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VlsConfig {
    #[serde(default)]
    pub features: FeatureSet,

    /// Always persist a log file, whatever trace level the client asks for
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Root of the V installation (contains `vlib/`)
    #[serde(default)]
    pub vroot: Option<PathBuf>,

    #[serde(default)]
    pub indexing: IndexingMode,

    /// Override the OS used to select platform-specific builtin files
    #[serde(default)]
    pub target_os: Option<String>,
}

impl VlsConfig {
    /// Log file location: configured path, else `~/.vls/vls.log`, else the temp dir
    pub fn resolved_log_path(&self) -> PathBuf {
        self.log_path.clone().unwrap_or_else(defaults::log_path)
    }
}

pub(crate) mod defaults {
    use std::path::PathBuf;

    pub const LOG_FILE_NAME: &str = "vls.log";

    pub fn log_path() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".vls"))
            .unwrap_or_else(std::env::temp_dir)
            .join(LOG_FILE_NAME)
    }
}
