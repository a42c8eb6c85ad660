//! CLI module for vls
//!
//! Provides command-line interface using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use crate::models::config::{FeatureFlag, IndexingMode, VlsConfig};

const LONG_ABOUT: &str = r#"
vls - language server for V

Speaks the Language Server Protocol over stdin/stdout. Editors start it as a
child process; it is not meant to be run by hand.

FEATURES:
  completion, hover, definition, folding_range, document_symbol,
  workspace_symbol, formatting, signature_help

EXAMPLES:
  vls --disable formatting,folding_range
  vls --enable hover --debug --log-path /tmp/vls.log
  vls --vroot ~/src/v

Logging goes to stderr; use RUST_LOG=vls=debug for verbose output.
"#;

/// vls - language server for V
#[derive(Parser, Debug, Default)]
#[command(name = "vls")]
#[command(author, version, about, long_about = LONG_ABOUT)]
pub struct Cli {
    /// Features to enable (comma separated)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub enable: Vec<FeatureFlag>,

    /// Features to disable (comma separated)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub disable: Vec<FeatureFlag>,

    /// Always write a session log file
    #[arg(long)]
    pub debug: bool,

    /// Root of the V installation
    #[arg(long, value_name = "DIR")]
    pub vroot: Option<PathBuf>,

    /// Session log file location
    #[arg(long, value_name = "FILE")]
    pub log_path: Option<PathBuf>,

    /// Extra config file layered over the global one
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Parse the builtin module without populating the symbol index
    #[arg(long)]
    pub deterministic_index: bool,
}

impl Cli {
    /// Apply flags on top of a loaded config. Disabling wins over enabling.
    pub fn apply(&self, config: &mut VlsConfig) {
        for flag in &self.enable {
            config.features.enable(*flag);
        }
        for flag in &self.disable {
            config.features.disable(*flag);
        }
        if self.debug {
            config.debug = true;
        }
        if let Some(vroot) = &self.vroot {
            config.vroot = Some(vroot.clone());
        }
        if let Some(log_path) = &self.log_path {
            config.log_path = Some(log_path.clone());
        }
        if self.deterministic_index {
            config.indexing = IndexingMode::Deterministic;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::FeatureSet;

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::try_parse_from(["vls"]).unwrap();
        let mut config = VlsConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.features, FeatureSet::all());
        assert!(!config.debug);
        assert_eq!(config.indexing, IndexingMode::Production);
    }

    #[test]
    fn test_feature_lists() {
        let cli = Cli::try_parse_from([
            "vls",
            "--disable",
            "formatting,folding_range",
            "--disable",
            "hover",
        ])
        .unwrap();
        assert_eq!(
            cli.disable,
            [
                FeatureFlag::Formatting,
                FeatureFlag::FoldingRange,
                FeatureFlag::Hover
            ]
        );

        let mut config = VlsConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.features.len(), FeatureFlag::ALL.len() - 3);
        assert!(!config.features.contains(FeatureFlag::Hover));
    }

    #[test]
    fn test_disable_wins() {
        let cli = Cli::try_parse_from(["vls", "--enable", "hover", "--disable", "hover"]).unwrap();
        let mut config = VlsConfig {
            features: FeatureSet::empty(),
            ..VlsConfig::default()
        };
        cli.apply(&mut config);
        assert!(config.features.is_empty());
    }

    #[test]
    fn test_paths_and_modes() {
        let cli = Cli::try_parse_from([
            "vls",
            "--debug",
            "--vroot",
            "/opt/v",
            "--log-path",
            "/tmp/v.log",
            "--deterministic-index",
        ])
        .unwrap();
        let mut config = VlsConfig::default();
        cli.apply(&mut config);

        assert!(config.debug);
        assert_eq!(config.vroot, Some(PathBuf::from("/opt/v")));
        assert_eq!(config.log_path, Some(PathBuf::from("/tmp/v.log")));
        assert_eq!(config.indexing, IndexingMode::Deterministic);
    }

    #[test]
    fn test_unknown_feature_rejected() {
        assert!(Cli::try_parse_from(["vls", "--enable", "teleport"]).is_err());
    }
}
