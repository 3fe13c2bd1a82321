//! [`TemplateSpec`] — one parsed template plus its destination.
//!
//! # Source path convention
//!
//! | source (relative to source dir)                     | kind   | destination / name          |
//! |-----------------------------------------------------|--------|-----------------------------|
//! | `dot_config/starship.toml.tmpl`                     | config | `.config/starship.toml`     |
//! | `dot_config/.theme-trigger.tmpl`                    | config | `.config/.theme-trigger`    |
//! | `run_dot_config/apply-theme.sh.tmpl`                | script | `apply-theme.sh`            |
//! | `run_apply-theme.ps1.tmpl`                          | script | `apply-theme.ps1`           |
//!
//! A first component starting with `run_` marks a change-triggered script;
//! everything else is a plain rendered config file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use swatch_core::OsName;

use crate::context::RenderContext;
use crate::error::RenderError;
use crate::parse::{self, Node, Reference};

/// Suffix every template source file carries.
pub const TEMPLATE_SUFFIX: &str = ".tmpl";
/// Prefix of the first path component that marks a script.
pub const SCRIPT_PREFIX: &str = "run_";
const DOT_PREFIX: &str = "dot_";

/// What a template renders into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateKind {
    /// A config file at `dest`, relative to the destination root.
    Config { dest: PathBuf },
    /// A change-triggered script; `file_name` keeps the interpreter extension.
    Script { file_name: String },
}

impl TemplateKind {
    /// Derive the kind from a `/`-separated source-relative name.
    pub fn from_source_name(name: &str) -> Self {
        let stripped = name.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(name);
        let components: Vec<&str> = stripped.split('/').filter(|c| !c.is_empty()).collect();

        let is_script = components
            .first()
            .is_some_and(|first| first.starts_with(SCRIPT_PREFIX));
        if is_script {
            let last = components.last().copied().unwrap_or_default();
            let last = if components.len() == 1 {
                last.strip_prefix(SCRIPT_PREFIX).unwrap_or(last)
            } else {
                last
            };
            return TemplateKind::Script { file_name: map_component(last) };
        }

        let dest = components.iter().map(|c| map_component(c)).collect();
        TemplateKind::Config { dest }
    }
}

fn map_component(component: &str) -> String {
    match component.strip_prefix(DOT_PREFIX) {
        Some(rest) => format!(".{rest}"),
        None => component.to_owned(),
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    name: String,
    kind: TemplateKind,
    body: Vec<Node>,
    referenced_keys: BTreeSet<String>,
    target_os: Option<OsName>,
}

impl TemplateSpec {
    /// Parse `source`. `name` is the `/`-separated path relative to the
    /// source dir and decides the [`TemplateKind`].
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self, RenderError> {
        let name = name.into();
        let body = parse::parse(&name, source)?;
        let mut referenced_keys = BTreeSet::new();
        collect_keys(&body, &mut referenced_keys);
        let target_os = gate_os(&body);
        Ok(Self {
            kind: TemplateKind::from_source_name(&name),
            name,
            body,
            referenced_keys,
            target_os,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TemplateKind {
        &self.kind
    }

    pub fn is_script(&self) -> bool {
        matches!(self.kind, TemplateKind::Script { .. })
    }

    /// Destination relative to the destination root (configs only).
    pub fn dest(&self) -> Option<&Path> {
        match &self.kind {
            TemplateKind::Config { dest } => Some(dest),
            TemplateKind::Script { .. } => None,
        }
    }

    /// Every setting key the template reads, in any branch.
    pub fn referenced_keys(&self) -> &BTreeSet<String> {
        &self.referenced_keys
    }

    /// The OS this template is wholly gated on, if its only non-blank
    /// top-level content is a single `if` whose predicate pins one OS and
    /// which has no other arms.
    pub fn target_os(&self) -> Option<&OsName> {
        self.target_os.as_ref()
    }

    /// Render against `ctx`. Pure and deterministic.
    ///
    /// A template gated on another OS renders to the empty string.
    pub fn render(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        if let Some(target) = &self.target_os {
            if target != ctx.os {
                return Ok(String::new());
            }
        }
        let mut out = String::new();
        render_nodes(&self.body, ctx, &self.name, &mut out)?;
        Ok(out)
    }
}

fn render_nodes(
    nodes: &[Node],
    ctx: &RenderContext<'_>,
    template: &str,
    out: &mut String,
) -> Result<(), RenderError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Value { reference: Reference::Os, .. } => out.push_str(ctx.os.as_str()),
            Node::Value { reference: Reference::Setting(key), default } => {
                match (ctx.settings.get(key), default) {
                    (Some(value), _) => out.push_str(&value.to_string()),
                    (None, Some(default)) => out.push_str(default),
                    (None, None) => {
                        return Err(RenderError::MissingKey {
                            template: template.to_owned(),
                            key: key.clone(),
                        })
                    }
                }
            }
            Node::Branch { arms, otherwise } => {
                let mut taken = None;
                for (pred, body) in arms {
                    if pred.eval(ctx, template)? {
                        taken = Some(body);
                        break;
                    }
                }
                render_nodes(taken.unwrap_or(otherwise), ctx, template, out)?;
            }
        }
    }
    Ok(())
}

fn collect_keys(nodes: &[Node], keys: &mut BTreeSet<String>) {
    for node in nodes {
        match node {
            Node::Text(_) | Node::Value { reference: Reference::Os, .. } => {}
            Node::Value { reference: Reference::Setting(key), .. } => {
                keys.insert(key.clone());
            }
            Node::Branch { arms, otherwise } => {
                for (pred, body) in arms {
                    keys.extend(pred.keys().into_iter().map(str::to_owned));
                    collect_keys(body, keys);
                }
                collect_keys(otherwise, keys);
            }
        }
    }
}

fn gate_os(body: &[Node]) -> Option<OsName> {
    let mut significant = body
        .iter()
        .filter(|node| !matches!(node, Node::Text(t) if t.trim().is_empty()));
    let only = significant.next()?;
    if significant.next().is_some() {
        return None;
    }
    match only {
        Node::Branch { arms, otherwise } if arms.len() == 1 && otherwise.is_empty() => {
            arms[0].0.required_os().cloned()
        }
        _ => None,
    }
}
