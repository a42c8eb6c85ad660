//! Capability negotiation
//!
//! Maps the configured feature set to the capabilities advertised in the
//! `initialize` response. Pure: the result depends on the feature set alone.

use super::protocol::{
    CompletionOptions, ServerCapabilities, SignatureHelpOptions, TextDocumentSyncKind,
};
use crate::models::config::{FeatureFlag, FeatureSet};

/// Characters that re-trigger completion while typing
pub const COMPLETION_TRIGGER_CHARACTERS: [char; 7] = ['=', '.', ':', '{', ',', '(', ' '];

pub const SIGNATURE_HELP_TRIGGER_CHARACTERS: [char; 1] = ['('];

pub const SIGNATURE_HELP_RETRIGGER_CHARACTERS: [char; 2] = [',', ' '];

/// Document sync level advertised regardless of features
pub const TEXT_DOCUMENT_SYNC: TextDocumentSyncKind = TextDocumentSyncKind::Full;

/// Compute the server capabilities for a feature set.
pub fn negotiate(features: &FeatureSet) -> ServerCapabilities {
    let mut capabilities = ServerCapabilities {
        text_document_sync: Some(TEXT_DOCUMENT_SYNC),
        ..Default::default()
    };

    for feature in features.iter() {
        match feature {
            FeatureFlag::Completion => {
                capabilities.completion_provider = Some(CompletionOptions {
                    resolve_provider: Some(false),
                    trigger_characters: Some(to_strings(&COMPLETION_TRIGGER_CHARACTERS)),
                });
            }
            FeatureFlag::SignatureHelp => {
                capabilities.signature_help_provider = Some(SignatureHelpOptions {
                    trigger_characters: Some(to_strings(&SIGNATURE_HELP_TRIGGER_CHARACTERS)),
                    retrigger_characters: Some(to_strings(&SIGNATURE_HELP_RETRIGGER_CHARACTERS)),
                });
            }
            FeatureFlag::Hover => capabilities.hover_provider = Some(true),
            FeatureFlag::Definition => capabilities.definition_provider = Some(true),
            FeatureFlag::FoldingRange => capabilities.folding_range_provider = Some(true),
            FeatureFlag::DocumentSymbol => capabilities.document_symbol_provider = Some(true),
            FeatureFlag::WorkspaceSymbol => capabilities.workspace_symbol_provider = Some(true),
            FeatureFlag::Formatting => capabilities.document_formatting_provider = Some(true),
        }
    }

    capabilities
}

fn to_strings(chars: &[char]) -> Vec<String> {
    chars.iter().map(char::to_string).collect()
}
