//! Branch predicates: a closed, tagged tree evaluated against a
//! [`RenderContext`].
//!
//! There is no general expression language: a predicate compares the running
//! OS or one setting against a literal, and combines such comparisons with
//! `not`, `and` and `or`.

use swatch_core::OsName;

use crate::context::RenderContext;
use crate::error::RenderError;

/// A boolean condition attached to an `if` / `else if` arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `eq .os "linux"`
    OsEq(OsName),
    /// `eq .current_theme "gruvbox"`
    KeyEq { key: String, value: String },
    /// `not (…)`, also produced by `ne`.
    Not(Box<Predicate>),
    /// `and (…) (…) …`
    And(Vec<Predicate>),
    /// `or (…) (…) …`
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Evaluate against `ctx`.
    ///
    /// Every operand of `and` / `or` is evaluated, so a missing key is
    /// reported even when an earlier operand already decides the result.
    pub fn eval(&self, ctx: &RenderContext<'_>, template: &str) -> Result<bool, RenderError> {
        match self {
            Predicate::OsEq(os) => Ok(ctx.os == os),
            Predicate::KeyEq { key, value } => match ctx.settings.get(key) {
                Some(actual) => Ok(actual.to_string() == *value),
                None => Err(RenderError::MissingKey {
                    template: template.to_owned(),
                    key: key.clone(),
                }),
            },
            Predicate::Not(inner) => Ok(!inner.eval(ctx, template)?),
            Predicate::And(ops) => {
                let results = eval_all(ops, ctx, template)?;
                Ok(results.into_iter().all(|b| b))
            }
            Predicate::Or(ops) => {
                let results = eval_all(ops, ctx, template)?;
                Ok(results.into_iter().any(|b| b))
            }
        }
    }

    /// The OS this predicate can only be true on, if any.
    ///
    /// `eq .os "x"` requires `x`; an `and` requires whatever its first
    /// OS-bound operand requires. `or` and `not` never pin an OS.
    pub fn required_os(&self) -> Option<&OsName> {
        match self {
            Predicate::OsEq(os) => Some(os),
            Predicate::And(ops) => ops.iter().find_map(Predicate::required_os),
            Predicate::KeyEq { .. } | Predicate::Not(_) | Predicate::Or(_) => None,
        }
    }

    /// Setting keys this predicate reads.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Predicate::OsEq(_) => vec![],
            Predicate::KeyEq { key, .. } => vec![key.as_str()],
            Predicate::Not(inner) => inner.keys(),
            Predicate::And(ops) | Predicate::Or(ops) => ops.iter().flat_map(Predicate::keys).collect(),
        }
    }
}

fn eval_all(
    ops: &[Predicate],
    ctx: &RenderContext<'_>,
    template: &str,
) -> Result<Vec<bool>, RenderError> {
    ops.iter().map(|op| op.eval(ctx, template)).collect()
}
