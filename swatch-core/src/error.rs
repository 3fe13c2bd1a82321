//! Error types for swatch-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading the data file or resolving locations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure (permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The data file did not exist at the expected path.
    #[error("data file not found at {path}")]
    NotFound { path: PathBuf },

    /// YAML parse error on load; carries the file path and serde_yaml line context.
    #[error("failed to parse data file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The source manifest exists but is not a valid manifest document.
    #[error("failed to parse source manifest at {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` and `SWATCH_HOME` is unset.
    #[error("cannot determine home directory; set $SWATCH_HOME or $HOME")]
    HomeNotFound,
}
