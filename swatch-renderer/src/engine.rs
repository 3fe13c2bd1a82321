//! Template engine — loads a source tree into [`TemplateSpec`]s and renders
//! them by name.
//!
//! Loading never fails because of one bad template: syntax errors are kept
//! per template in [`TemplateEngine::failures`] so callers can report them
//! alongside the templates that did parse.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::context::RenderContext;
use crate::error::{io_err, RenderError};
use crate::template::{TemplateSpec, TEMPLATE_SUFFIX};

// ---------------------------------------------------------------------------
// Source tree loading helpers
// ---------------------------------------------------------------------------

fn normalize_template_name(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn collect_template_files(dir: &Path, root: bool, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        // Hidden entries at the root (.git, .swatch.yaml) are not part of the tree.
        if root && entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, false, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Read every `*.tmpl` file under `dir` as `(name, raw bytes)`, sorted by name.
fn load_source_files(dir: &Path) -> Result<Vec<(String, Vec<u8>)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, true, &mut files)?;
    let mut templates = Vec::new();
    for path in files {
        let is_template = path
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.ends_with(TEMPLATE_SUFFIX));
        if !is_template {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    templates.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(templates)
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// A loaded, immutable set of templates.
///
/// Templates are kept in name order so iteration (and therefore rendering and
/// failure reporting) is deterministic.
#[derive(Debug, Default)]
pub struct TemplateEngine {
    specs: BTreeMap<String, TemplateSpec>,
    failures: Vec<(String, RenderError)>,
}

impl TemplateEngine {
    /// Load every `*.tmpl` under `source_dir`. A missing directory yields an
    /// empty engine; only I/O errors are fatal. A file that is not UTF-8 is
    /// recorded as a failure like a syntax error.
    pub fn load(source_dir: &Path) -> Result<Self, RenderError> {
        let mut engine = Self::default();
        for (name, bytes) in load_source_files(source_dir)? {
            match String::from_utf8(bytes) {
                Ok(source) => engine.insert(name, &source),
                Err(err) => {
                    let offset = err.utf8_error().valid_up_to();
                    let failure = RenderError::Encoding { template: name.clone(), offset };
                    engine.failures.push((name, failure));
                }
            }
        }
        engine.failures.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(engine)
    }

    /// Build from in-memory `(name, source)` pairs.
    pub fn from_sources<I, N, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<str>,
    {
        let mut engine = Self::default();
        for (name, source) in sources {
            engine.insert(name.into(), source.as_ref());
        }
        engine.failures.sort_by(|a, b| a.0.cmp(&b.0));
        engine
    }

    fn insert(&mut self, name: String, source: &str) {
        match TemplateSpec::parse(name.clone(), source) {
            Ok(spec) => {
                self.specs.insert(name, spec);
            }
            Err(err) => self.failures.push((name, err)),
        }
    }

    /// Successfully parsed templates, in name order.
    pub fn specs(&self) -> impl Iterator<Item = &TemplateSpec> {
        self.specs.values()
    }

    /// Templates that failed to parse, in name order.
    pub fn failures(&self) -> &[(String, RenderError)] {
        &self.failures
    }

    pub fn get(&self, name: &str) -> Option<&TemplateSpec> {
        self.specs.get(name)
    }

    /// Render one template by name.
    pub fn render(&self, name: &str, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let spec = self
            .specs
            .get(name)
            .ok_or_else(|| RenderError::UnknownTemplate(name.to_owned()))?;
        spec.render(ctx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use swatch_core::{OsName, Settings};
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn load_picks_up_only_tmpl_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "dot_config/starship.toml.tmpl", "palette = \"{{ .current_theme }}\"\n");
        write(dir.path(), "dot_config/README.md", "not a template");
        write(dir.path(), ".git/HEAD.tmpl", "hidden");
        write(dir.path(), ".swatch.yaml", "watch: [current_theme]\n");

        let engine = TemplateEngine::load(dir.path()).unwrap();
        let names: Vec<_> = engine.specs().map(TemplateSpec::name).collect();
        assert_eq!(names, ["dot_config/starship.toml.tmpl"]);
    }

    #[test]
    fn missing_source_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let engine = TemplateEngine::load(&dir.path().join("nope")).unwrap();
        assert_eq!(engine.specs().count(), 0);
        assert!(engine.failures().is_empty());
    }

    #[test]
    fn syntax_errors_are_kept_per_template() {
        let engine = TemplateEngine::from_sources([
            ("good.tmpl", "ok"),
            ("bad.tmpl", "{{ if eq .os \"linux\" }}"),
        ]);
        assert_eq!(engine.specs().count(), 1);
        assert_eq!(engine.failures().len(), 1);
        assert_eq!(engine.failures()[0].0, "bad.tmpl");
    }

    #[test]
    fn non_utf8_file_is_a_failure_not_a_load_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "dot_config/good.tmpl", "ok");
        let latin1 = dir.path().join("dot_config").join("latin1.conf.tmpl");
        fs::write(&latin1, b"caf\xe9 {{ .current_theme }}").unwrap();

        let engine = TemplateEngine::load(dir.path()).unwrap();
        let names: Vec<_> = engine.specs().map(TemplateSpec::name).collect();
        assert_eq!(names, ["dot_config/good.tmpl"]);
        assert!(matches!(
            &engine.failures()[0],
            (name, RenderError::Encoding { offset: 3, .. }) if name == "dot_config/latin1.conf.tmpl"
        ));
    }

    #[test]
    fn render_by_name() {
        let engine = TemplateEngine::from_sources([("t.tmpl", "theme={{ .current_theme }}")]);
        let settings: Settings = [("current_theme", "nord")].into_iter().collect();
        let os = OsName::linux();
        let ctx = RenderContext::new(&os, &settings);
        assert_eq!(engine.render("t.tmpl", &ctx).unwrap(), "theme=nord");
        assert!(matches!(
            engine.render("missing.tmpl", &ctx),
            Err(RenderError::UnknownTemplate(_))
        ));
    }
}
