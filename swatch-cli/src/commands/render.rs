//! `swatch render <template>` — print one rendered template.

use anyhow::{anyhow, Context, Result};
use clap::Args;

use swatch_core::ConfigStore;
use swatch_renderer::{RenderContext, TemplateEngine};

use super::{locations, target_os};

/// Arguments for `swatch render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Template path relative to the source tree, e.g. `dot_config/starship.toml.tmpl`.
    pub template: String,

    /// Render as if running on this OS.
    #[arg(long)]
    pub os: Option<String>,
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        let locations = locations()?;
        let engine = TemplateEngine::load(&locations.source_dir).with_context(|| {
            format!("failed to load templates from {}", locations.source_dir.display())
        })?;
        let name = self.template.replace('\\', "/");

        if let Some((_, err)) = engine.failures().iter().find(|(failed, _)| *failed == name) {
            return Err(anyhow!("{err}"));
        }

        let store = ConfigStore::at(&locations);
        let settings = store.load().context("failed to load settings")?;
        let os = target_os(self.os);
        let rendered = engine
            .render(&name, &RenderContext::new(&os, &settings))
            .with_context(|| format!("failed to render '{name}'"))?;
        print!("{rendered}");
        Ok(())
    }
}
