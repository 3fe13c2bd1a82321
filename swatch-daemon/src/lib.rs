//! Watch mode: re-run the sync cycle whenever the data file or the template
//! source tree changes.

mod error;
mod runtime;

pub use error::DaemonError;
pub use runtime::{
    init_tracing, init_tracing_with_default, run, start_blocking, CycleSummary, DEBOUNCE_WINDOW,
};
