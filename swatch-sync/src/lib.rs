//! # swatch-sync
//!
//! Change detection, at-most-once script dispatch and the sync cycle.
//!
//! Build a [`SyncCycle`] once per source tree and call [`SyncCycle::run`]
//! whenever the data file may have changed. Rendered configs are written
//! atomically; the running OS's script variant runs only when the watched
//! settings fingerprint differs from the last successful dispatch.

pub mod cancel;
pub mod cycle;
pub mod diff;
pub mod dispatch;
pub mod error;
pub mod fingerprint;
pub mod lock;
pub mod record;
pub mod runner;
pub mod variant;
pub mod writer;

pub use cancel::CancelToken;
pub use cycle::{CycleOptions, CycleReport, DiffReport, RenderFailure, StatusReport, SyncCycle};
pub use diff::FileDiff;
pub use dispatch::{DispatchOutcome, ScriptDispatcher, SkipReason};
pub use error::SyncError;
pub use fingerprint::Fingerprint;
pub use record::DispatchRecord;
pub use runner::{Invocation, ProcessRunner, RunFailure, RunOutput, ScriptRunner};
pub use variant::{Interpreter, ScriptVariant, VariantSet};
pub use writer::WriteResult;
