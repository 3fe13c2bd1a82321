//! One sync pass: load → render → fingerprint → dispatch → persist.
//!
//! A [`SyncCycle`] is built once (templates parsed, script variants
//! validated) and can then be run any number of times. Every run reads the
//! data file fresh, takes the cycle lock for its whole duration and only
//! writes the dispatch record after a script ran successfully.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;

use swatch_core::locations::{ENV_CONFIG_DIR, ENV_DEST_DIR, ENV_HOME};
use swatch_core::manifest::DEFAULT_TRIGGER_TEMPLATE;
use swatch_core::{ConfigStore, Locations, OsName, Settings, SourceManifest};
use swatch_renderer::{RenderContext, TemplateEngine, TemplateSpec};

use crate::cancel::CancelToken;
use crate::diff::{diff_file, FileDiff};
use crate::dispatch::{DispatchOutcome, ScriptDispatcher, SkipReason};
use crate::error::SyncError;
use crate::fingerprint::{self, Fingerprint};
use crate::lock::CycleLock;
use crate::record::{self, DispatchRecord};
use crate::runner::{Invocation, ProcessRunner, ScriptRunner};
use crate::variant::{ScriptVariant, VariantSet};
use crate::writer::{atomic_write, write_rendered, WriteResult};

pub const ENV_DATA_FILE: &str = "SWATCH_DATA_FILE";
pub const ENV_FINGERPRINT: &str = "SWATCH_FINGERPRINT";
pub const ENV_TRIGGER: &str = "SWATCH_TRIGGER";

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct CycleOptions {
    /// Render and report only: no config writes, no script, no record.
    pub dry_run: bool,
    pub cancel: CancelToken,
    /// Script timeout; overrides `script_timeout_secs` from the manifest.
    pub script_timeout: Option<Duration>,
}

/// A template that failed to parse or render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderFailure {
    pub template: String,
    pub message: String,
}

/// What one run did.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub settings_loaded: usize,
    pub templates_rendered: usize,
    pub render_failures: Vec<RenderFailure>,
    pub writes: Vec<WriteResult>,
    pub fingerprint: Fingerprint,
    pub previous_fingerprint: Option<Fingerprint>,
    pub fingerprint_changed: bool,
    pub dispatch: DispatchOutcome,
}

/// Side-effect-free view of the dispatch state.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub os: OsName,
    pub watched: Vec<String>,
    pub fingerprint: Fingerprint,
    pub record: Option<DispatchRecord>,
    pub variant: Option<ScriptVariant>,
    /// The next real run would invoke `variant`.
    pub pending: bool,
}

/// Rendered config outputs plus failures, in source-name order.
#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    pub diffs: Vec<FileDiff>,
    pub render_failures: Vec<RenderFailure>,
}

struct Rendered {
    outputs: BTreeMap<String, String>,
    failures: Vec<RenderFailure>,
}

pub struct SyncCycle {
    locations: Locations,
    os: OsName,
    store: ConfigStore,
    manifest: SourceManifest,
    engine: TemplateEngine,
    dispatcher: ScriptDispatcher,
    trigger: Option<String>,
    runner: Arc<dyn ScriptRunner>,
}

impl std::fmt::Debug for SyncCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCycle")
            .field("locations", &self.locations)
            .field("os", &self.os)
            .field("manifest", &self.manifest)
            .field("variants", &self.dispatcher.variants().len())
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

impl SyncCycle {
    /// Load the source tree and manifest and validate the script variants.
    ///
    /// Fails with [`SyncError::Configuration`] when scripts overlap, lack an
    /// OS gate or do not parse, or when the manifest names a trigger
    /// template that does not exist.
    pub fn new(locations: Locations, os: OsName) -> Result<Self, SyncError> {
        let manifest = SourceManifest::load_at(&locations.source_dir)?;
        let engine = TemplateEngine::load(&locations.source_dir)?;
        let variants = VariantSet::build(&engine)?;

        let trigger = match &manifest.trigger {
            Some(name) if engine.get(name).is_some() => Some(name.clone()),
            Some(name) => {
                return Err(SyncError::Configuration(format!(
                    "trigger template {name} is missing or does not parse"
                )))
            }
            None => engine
                .get(DEFAULT_TRIGGER_TEMPLATE)
                .map(|_| DEFAULT_TRIGGER_TEMPLATE.to_owned()),
        };

        tracing::debug!(
            "loaded {} templates ({} script variants) from {}",
            engine.specs().count(),
            variants.len(),
            locations.source_dir.display()
        );

        Ok(Self {
            store: ConfigStore::at(&locations),
            locations,
            os,
            manifest,
            engine,
            dispatcher: ScriptDispatcher::new(variants),
            trigger,
            runner: Arc::new(ProcessRunner),
        })
    }

    /// Replace the process runner.
    pub fn with_runner(mut self, runner: Arc<dyn ScriptRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn locations(&self) -> &Locations {
        &self.locations
    }

    pub fn os(&self) -> &OsName {
        &self.os
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn manifest(&self) -> &SourceManifest {
        &self.manifest
    }

    pub fn variants(&self) -> &VariantSet {
        self.dispatcher.variants()
    }

    /// Run one full cycle.
    pub fn run(&self, options: &CycleOptions) -> Result<CycleReport, SyncError> {
        let cancel = &options.cancel;
        check_cancel(cancel)?;
        let _lock = CycleLock::acquire(&self.locations.state_dir, self.manifest.lock_wait())?;
        check_cancel(cancel)?;

        let settings = self.store.load()?;
        let rendered = self.render_configs(&settings);
        check_cancel(cancel)?;

        let mut writes = Vec::new();
        for spec in self.engine.specs() {
            let (Some(dest), Some(content)) = (spec.dest(), rendered.outputs.get(spec.name())) else {
                continue;
            };
            let path = self.locations.dest_dir.join(dest);
            writes.push(write_rendered(&path, content, options.dry_run)?);
        }

        let watched = self.manifest.watched_keys();
        let fingerprint = fingerprint::compute(&settings, &watched);
        let previous = record::load_at(&self.locations.state_dir)?.map(|r| r.fingerprint);
        let fingerprint_changed = previous.as_ref() != Some(&fingerprint);

        check_cancel(cancel)?;
        let dispatch = if options.dry_run {
            dry_run_outcome(&self.dispatcher, &fingerprint, previous.as_ref(), &self.os)
        } else {
            self.dispatcher.dispatch(&fingerprint, previous.as_ref(), &self.os, |variant| {
                let trigger = self.trigger_content(&settings, &watched, &rendered)?;
                self.invoke(variant, &settings, &fingerprint, &trigger, options)
            })
        };

        if let DispatchOutcome::Invoked { variant } = &dispatch {
            record::save_at(
                &self.locations.state_dir,
                &DispatchRecord {
                    fingerprint: fingerprint.clone(),
                    variant: variant.source.clone(),
                    dispatched_at: Utc::now(),
                },
            )?;
        }

        Ok(CycleReport {
            settings_loaded: settings.len(),
            templates_rendered: rendered.outputs.len(),
            render_failures: rendered.failures,
            writes,
            fingerprint,
            previous_fingerprint: previous,
            fingerprint_changed,
            dispatch,
        })
    }

    /// Current fingerprint, stored record and whether a dispatch is pending.
    pub fn status(&self) -> Result<StatusReport, SyncError> {
        let settings = self.store.load()?;
        let watched = self.manifest.watched_keys();
        let fingerprint = fingerprint::compute(&settings, &watched);
        let record = record::load_at(&self.locations.state_dir)?;
        let previous = record.as_ref().map(|r| &r.fingerprint);
        let pending = self.dispatcher.is_pending(&fingerprint, previous, &self.os);
        Ok(StatusReport {
            os: self.os.clone(),
            variant: self.dispatcher.variants().select(&self.os).cloned(),
            watched,
            fingerprint,
            record,
            pending,
        })
    }

    /// Diffs between what a run would write and the destination tree.
    pub fn diff(&self) -> Result<DiffReport, SyncError> {
        let settings = self.store.load()?;
        let rendered = self.render_configs(&settings);
        let mut diffs = Vec::new();
        for spec in self.engine.specs() {
            let (Some(dest), Some(content)) = (spec.dest(), rendered.outputs.get(spec.name())) else {
                continue;
            };
            if let Some(diff) = diff_file(&self.locations.dest_dir, dest, content)? {
                diffs.push(diff);
            }
        }
        Ok(DiffReport { diffs, render_failures: rendered.failures })
    }

    /// Render every config template in parallel. Whitespace-only outputs are
    /// dropped; parse failures from load time are folded in.
    fn render_configs(&self, settings: &Settings) -> Rendered {
        let ctx = RenderContext::new(&self.os, settings);
        let specs: Vec<&TemplateSpec> = self.engine.specs().filter(|s| !s.is_script()).collect();
        let results: Vec<(String, Result<String, String>)> = specs
            .par_iter()
            .map(|spec| (spec.name().to_owned(), spec.render(&ctx).map_err(|e| e.to_string())))
            .collect();

        let mut outputs = BTreeMap::new();
        let mut failures: Vec<RenderFailure> = self
            .engine
            .failures()
            .iter()
            .map(|(name, err)| RenderFailure { template: name.clone(), message: err.to_string() })
            .collect();
        for (name, result) in results {
            match result {
                Ok(content) if content.trim().is_empty() => {
                    tracing::debug!("{name} renders empty on {}; skipped", self.os);
                }
                Ok(content) => {
                    outputs.insert(name, content);
                }
                Err(message) => {
                    tracing::warn!("{name}: {message}");
                    failures.push(RenderFailure { template: name, message });
                }
            }
        }
        failures.sort_by(|a, b| a.template.cmp(&b.template));
        Rendered { outputs, failures }
    }

    fn trigger_content(
        &self,
        settings: &Settings,
        watched: &[String],
        rendered: &Rendered,
    ) -> Result<String, String> {
        let Some(name) = &self.trigger else {
            return Ok(fingerprint::default_trigger_content(settings, watched));
        };
        if let Some(content) = rendered.outputs.get(name) {
            return Ok(content.clone());
        }
        match rendered.failures.iter().find(|f| &f.template == name) {
            Some(failure) => Err(format!("trigger template {name} failed: {}", failure.message)),
            // Renders to nothing on this OS.
            None => Ok(String::new()),
        }
    }

    fn invoke(
        &self,
        variant: &ScriptVariant,
        settings: &Settings,
        fingerprint: &Fingerprint,
        trigger: &str,
        options: &CycleOptions,
    ) -> Result<(), String> {
        let spec = self
            .engine
            .get(&variant.source)
            .ok_or_else(|| format!("script template {} is not loaded", variant.source))?;
        let script = spec
            .render(&RenderContext::new(&self.os, settings))
            .map_err(|e| format!("script failed to render: {e}"))?;

        let script_path = self.scripts_dir().join(&variant.file_name);
        atomic_write(&script_path, script.as_bytes()).map_err(|e| e.to_string())?;

        let env = [
            (ENV_DATA_FILE, self.store.path().display().to_string()),
            (ENV_CONFIG_DIR, self.locations.config_dir.display().to_string()),
            (ENV_DEST_DIR, self.locations.dest_dir.display().to_string()),
            (ENV_HOME, self.locations.home_dir.display().to_string()),
            (ENV_FINGERPRINT, fingerprint.to_string()),
            (ENV_TRIGGER, trigger.to_owned()),
        ];
        let invocation = Invocation {
            variant,
            script_path: &script_path,
            working_dir: &self.locations.dest_dir,
            env: &env,
            stdin: trigger,
            timeout: options.script_timeout.unwrap_or_else(|| self.manifest.script_timeout()),
            cancel: &options.cancel,
        };
        match self.runner.run(&invocation) {
            Ok(output) => {
                log_output(&variant.file_name, "stdout", &output.stdout);
                log_output(&variant.file_name, "stderr", &output.stderr);
                Ok(())
            }
            Err(failure) => Err(failure.to_string()),
        }
    }

    fn scripts_dir(&self) -> PathBuf {
        self.locations.state_dir.join("scripts")
    }
}

fn check_cancel(cancel: &CancelToken) -> Result<(), SyncError> {
    if cancel.is_cancelled() {
        Err(SyncError::Cancelled)
    } else {
        Ok(())
    }
}

fn dry_run_outcome(
    dispatcher: &ScriptDispatcher,
    new: &Fingerprint,
    previous: Option<&Fingerprint>,
    os: &OsName,
) -> DispatchOutcome {
    let reason = if previous == Some(new) {
        SkipReason::Unchanged
    } else if dispatcher.is_pending(new, previous, os) {
        SkipReason::DryRun
    } else {
        SkipReason::NoVariantForOs
    };
    DispatchOutcome::Skipped { reason }
}

fn log_output(script: &str, stream: &str, text: &str) {
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        tracing::info!("[{script} {stream}] {line}");
    }
}
