//! # swatch-renderer
//!
//! Renders dotfile templates against the settings data file and the running
//! OS. Branches are a closed predicate tree (`eq`, `ne`, `not`, `and`, `or`
//! over `.os` and setting keys); there is no embedded interpreter.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use swatch_core::{OsName, Settings};
//! use swatch_renderer::{RenderContext, TemplateEngine};
//!
//! fn render_all(source: &Path, settings: &Settings) {
//!     if let Ok(engine) = TemplateEngine::load(source) {
//!         let os = OsName::current();
//!         let ctx = RenderContext::new(&os, settings);
//!         for spec in engine.specs() {
//!             if let Ok(out) = spec.render(&ctx) {
//!                 println!("{}: {} bytes", spec.name(), out.len());
//!             }
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod parse;
pub mod predicate;
pub mod template;

pub use context::RenderContext;
pub use engine::TemplateEngine;
pub use error::RenderError;
pub use predicate::Predicate;
pub use template::{TemplateKind, TemplateSpec};
