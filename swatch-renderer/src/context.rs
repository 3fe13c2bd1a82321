//! Render context: the explicit `(running OS, settings)` pair every
//! predicate and interpolation is evaluated against.

use swatch_core::{OsName, Settings};

/// Borrowed rendering inputs. Cheap to copy and `Sync`, so one context can be
/// shared by parallel renders.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub os: &'a OsName,
    pub settings: &'a Settings,
}

impl<'a> RenderContext<'a> {
    pub fn new(os: &'a OsName, settings: &'a Settings) -> Self {
        Self { os, settings }
    }
}
