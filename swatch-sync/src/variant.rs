//! Script variants — the OS-specific `run_` templates of a source tree.
//!
//! Every script must be wholly gated on one OS (`{{- if eq .os "linux" }}`
//! around its entire body) and no two scripts may target the same OS. Both
//! rules are checked once, when the set is built.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use swatch_core::OsName;
use swatch_renderer::{TemplateEngine, TemplateKind, TemplateSpec};

use crate::error::SyncError;

const NO_ARGS: &[&str] = &[];
const WINDOWS_POWERSHELL_ARGS: &[&str] = &["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"];
const PWSH_ARGS: &[&str] = &["-NoProfile", "-File"];

/// Program used to run a rendered script, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpreter {
    /// `.sh`
    Sh,
    /// `.bash`
    Bash,
    /// `.ps1`
    PowerShell,
}

impl Interpreter {
    pub fn for_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name).extension()?.to_str()?;
        match ext {
            "sh" => Some(Interpreter::Sh),
            "bash" => Some(Interpreter::Bash),
            "ps1" => Some(Interpreter::PowerShell),
            _ => None,
        }
    }

    /// Program and leading arguments; the script path is appended by the
    /// runner.
    pub fn command(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Interpreter::Sh => ("sh", NO_ARGS),
            Interpreter::Bash => ("bash", NO_ARGS),
            Interpreter::PowerShell if cfg!(windows) => ("powershell", WINDOWS_POWERSHELL_ARGS),
            Interpreter::PowerShell => ("pwsh", PWSH_ARGS),
        }
    }
}

/// One executable script template, gated to a single OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptVariant {
    /// Template source name, e.g. `run_dot_config/apply-theme.sh.tmpl`.
    pub source: String,
    /// Name of the rendered file, e.g. `apply-theme.sh`.
    pub file_name: String,
    pub os: OsName,
    pub interpreter: Interpreter,
}

impl ScriptVariant {
    fn from_spec(spec: &TemplateSpec) -> Result<Self, SyncError> {
        let TemplateKind::Script { file_name } = spec.kind() else {
            return Err(SyncError::Configuration(format!(
                "{} is not a script template",
                spec.name()
            )));
        };
        let os = spec.target_os().cloned().ok_or_else(|| {
            SyncError::Configuration(format!(
                "script {} has no explicit OS gate; wrap its body in {{{{ if eq .os \"<os>\" }}}}",
                spec.name()
            ))
        })?;
        let interpreter = Interpreter::for_file_name(file_name).ok_or_else(|| {
            SyncError::Configuration(format!(
                "script {} has no known interpreter (expected .sh, .bash or .ps1)",
                spec.name()
            ))
        })?;
        Ok(Self {
            source: spec.name().to_owned(),
            file_name: file_name.clone(),
            os,
            interpreter,
        })
    }
}

/// The validated script variants of a source tree, at most one per OS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantSet {
    by_os: BTreeMap<String, ScriptVariant>,
}

impl VariantSet {
    /// Collect and validate every script template of `engine`.
    pub fn build(engine: &TemplateEngine) -> Result<Self, SyncError> {
        if let Some((name, err)) = engine
            .failures()
            .iter()
            .find(|(name, _)| matches!(TemplateKind::from_source_name(name), TemplateKind::Script { .. }))
        {
            return Err(SyncError::Configuration(format!("script {name} does not parse: {err}")));
        }

        let mut by_os: BTreeMap<String, ScriptVariant> = BTreeMap::new();
        for spec in engine.specs().filter(|s| s.is_script()) {
            let variant = ScriptVariant::from_spec(spec)?;
            if let Some(existing) = by_os.get(variant.os.as_str()) {
                return Err(SyncError::Configuration(format!(
                    "scripts {} and {} both target {}",
                    existing.source, variant.source, variant.os
                )));
            }
            by_os.insert(variant.os.as_str().to_owned(), variant);
        }
        Ok(Self { by_os })
    }

    /// The unique variant for `os`, if any.
    pub fn select(&self, os: &OsName) -> Option<&ScriptVariant> {
        self.by_os.get(os.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptVariant> {
        self.by_os.values()
    }

    pub fn len(&self) -> usize {
        self.by_os.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_os.is_empty()
    }
}
