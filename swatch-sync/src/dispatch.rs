//! At-most-once dispatch of the running OS's script variant.

use serde::Serialize;

use swatch_core::OsName;

use crate::fingerprint::Fingerprint;
use crate::variant::{ScriptVariant, VariantSet};

/// Why no script ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The fingerprint matches the last successful dispatch.
    Unchanged,
    /// The fingerprint changed but no variant targets the running OS.
    NoVariantForOs,
    /// The fingerprint changed but the cycle is a dry run.
    DryRun,
}

/// Result of one dispatch decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Skipped { reason: SkipReason },
    Invoked { variant: ScriptVariant },
    Failed { variant: Option<ScriptVariant>, reason: String },
}

impl DispatchOutcome {
    pub fn is_invoked(&self) -> bool {
        matches!(self, DispatchOutcome::Invoked { .. })
    }
}

/// Decides whether the running OS's variant runs for a fingerprint.
#[derive(Debug, Clone, Default)]
pub struct ScriptDispatcher {
    variants: VariantSet,
}

impl ScriptDispatcher {
    pub fn new(variants: VariantSet) -> Self {
        Self { variants }
    }

    pub fn variants(&self) -> &VariantSet {
        &self.variants
    }

    /// Whether `new` would select a variant to run on `os`.
    pub fn is_pending(&self, new: &Fingerprint, previous: Option<&Fingerprint>, os: &OsName) -> bool {
        previous != Some(new) && self.variants.select(os).is_some()
    }

    /// Dispatch for `new` against the last dispatched fingerprint.
    ///
    /// `invoke` runs the selected variant and is called at most once; it is
    /// never called when the fingerprint is unchanged or no variant targets
    /// `os`.
    pub fn dispatch<F>(
        &self,
        new: &Fingerprint,
        previous: Option<&Fingerprint>,
        os: &OsName,
        invoke: F,
    ) -> DispatchOutcome
    where
        F: FnOnce(&ScriptVariant) -> Result<(), String>,
    {
        if previous == Some(new) {
            tracing::debug!("fingerprint {} unchanged; not dispatching", new.short());
            return DispatchOutcome::Skipped { reason: SkipReason::Unchanged };
        }
        let Some(variant) = self.variants.select(os) else {
            tracing::info!("fingerprint changed but no script targets {os}");
            return DispatchOutcome::Skipped { reason: SkipReason::NoVariantForOs };
        };
        tracing::info!(
            "fingerprint changed ({} -> {}); running {}",
            previous.map(Fingerprint::short).unwrap_or("none"),
            new.short(),
            variant.source
        );
        match invoke(variant) {
            Ok(()) => DispatchOutcome::Invoked { variant: variant.clone() },
            Err(reason) => {
                tracing::warn!("{} failed: {reason}", variant.source);
                DispatchOutcome::Failed { variant: Some(variant.clone()), reason }
            }
        }
    }
}
