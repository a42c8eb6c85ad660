//! Error types for vls

use std::path::PathBuf;

use thiserror::Error;

use crate::infra::lsp::protocol::error_codes;

pub type VlsResult<T> = std::result::Result<T, VlsError>;

#[derive(Debug, Error)]
pub enum VlsError {
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Index(#[from] IndexError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid params for '{method}': {source}")]
    InvalidParams {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing params for '{0}'")]
    MissingParams(String),

    #[error("Server not initialized")]
    NotInitialized,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    pub fn invalid_params(method: &str, source: serde_json::Error) -> Self {
        Self::InvalidParams {
            method: method.to_string(),
            source,
        }
    }

    pub fn error_code(&self) -> i32 {
        match self {
            Self::InvalidParams { .. } | Self::MissingParams(_) => error_codes::INVALID_PARAMS,
            Self::NotInitialized => error_codes::SERVER_NOT_INITIALIZED,
            Self::InvalidRequest(_) => error_codes::INVALID_REQUEST,
            Self::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            Self::Json(_) => error_codes::PARSE_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Cannot locate the V installation. Set `vroot` in the config, pass --vroot or export VROOT")]
    VrootNotFound,

    #[error("Failed to list builtin module at {path}: {source}")]
    Enumerate {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
