//! Error type shared by every engine operation.
//!
//! Nothing in the engine panics on bad input: validation, parsing, file and
//! export failures all come back as an [`EngineError`] so the shell decides
//! how to surface them.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A connection attempt violated the handle typing rules.
    #[error("invalid connection: {0}")]
    InvalidConnection(String),

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("unknown edge '{0}'")]
    UnknownEdge(String),

    /// The interactive reconnection flow was driven out of order.
    #[error("reconnect: {0}")]
    Reconnect(String),

    /// Malformed JSON or XML text.
    #[error("invalid {format}: {message}")]
    Parse { format: &'static str, message: String },

    /// The payload parsed but lacks a required collection.
    #[error("Invalid diagram format: missing {0}")]
    MissingCollection(&'static str),

    #[error("Unknown format")]
    UnknownFormat,

    #[error("{0}")]
    Io(String),

    /// Rasterization or packaging failed; the diagram is untouched.
    #[error("{0}")]
    Export(String),

    #[error("config: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn parse(format: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            format,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<EngineError> for String {
    fn from(val: EngineError) -> Self {
        val.to_string()
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
