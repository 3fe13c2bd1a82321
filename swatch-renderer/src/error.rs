//! Error types for swatch-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from parsing or rendering a template.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Malformed directive syntax. `offset` is the byte offset of the action
    /// in the template source; `line` is 1-based.
    #[error("syntax error in {template} at line {line} (offset {offset}): {message}")]
    Syntax {
        template: String,
        offset: usize,
        line: usize,
        message: String,
    },

    /// An active branch or interpolation referenced a key that is not set and
    /// has no default.
    #[error("{template}: key '{key}' is not set and has no default")]
    MissingKey { template: String, key: String },

    /// The template file is not valid UTF-8. `offset` is the first invalid byte.
    #[error("{template} is not valid UTF-8 (invalid byte at offset {offset})")]
    Encoding { template: String, offset: usize },

    /// Asked to render a template name that was never loaded.
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    /// Filesystem error while loading the source tree.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}
