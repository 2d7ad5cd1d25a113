// crates/grantway-core/src/expr/mod.rs
// ============================================================================
// Module: Grantway Expression Language
// Description: Compile-and-evaluate entry point for policy expressions.
// Purpose: Evaluate author-supplied conditions against appeal data safely.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Policy authors write small, side-effect-free expressions (`approve_if`,
//! `when`, `$`-prefixed approver entries). External data is reachable only
//! through `$`-rooted references; before execution the evaluator statically
//! scans the compiled program's references and resolves each dot path against
//! the supplied variables. Any missing root or nested segment fails with
//! [`ExprError::ParameterNotFound`] before anything runs, so absence is loud
//! instead of silently false.
//!
//! Evaluation is deterministic: no I/O, no randomness, no clock reads. The
//! same expression and variables always yield the same value, which is what
//! makes re-evaluation on every advance pass safe.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

mod eval;
mod parser;

pub(crate) use eval::values_equal;

// ============================================================================
// SECTION: Expression Errors
// ============================================================================

/// Errors raised while compiling or evaluating an expression.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Compile and evaluation variants carry the offending expression text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    /// The expression failed to compile.
    #[error("invalid expression {expr:?}: {detail}")]
    Invalid {
        /// Offending expression text.
        expr: String,
        /// Compile failure detail.
        detail: String,
    },
    /// A referenced parameter is missing from the variables.
    #[error("parameter not found: {path}")]
    ParameterNotFound {
        /// Dot-joined reference path with the `$` prefix stripped.
        path: String,
    },
    /// The expression failed at evaluation time.
    #[error("evaluating expression {expr:?}: {detail}")]
    Evaluation {
        /// Offending expression text.
        expr: String,
        /// Evaluation failure detail.
        detail: String,
    },
}

// ============================================================================
// SECTION: Expression
// ============================================================================

/// Policy expression text.
///
/// # Invariants
/// - The wrapped text is opaque until compiled; invalid text surfaces as
///   [`ExprError::Invalid`] at evaluation or check time, never as a panic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expression(String);

impl Expression {
    /// Creates an expression from text.
    #[must_use]
    pub fn new(expr: impl Into<String>) -> Self {
        Self(expr.into())
    }

    /// Returns the expression text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks that the expression compiles, without evaluating it.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Invalid`] when the text fails to parse.
    pub fn check(&self) -> Result<(), ExprError> {
        self.compile().map(|_| ())
    }

    /// Evaluates the expression against named variables.
    ///
    /// Every `$`-reference in the program is resolved against `vars` before
    /// execution; resolution failures abort the call with no partial
    /// evaluation.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Invalid`] on compile failure,
    /// [`ExprError::ParameterNotFound`] when a referenced path is absent from
    /// `vars`, and [`ExprError::Evaluation`] when execution fails.
    pub fn evaluate(&self, vars: &Map<String, Value>) -> Result<Value, ExprError> {
        let program = self.compile()?;

        let mut env = BTreeMap::new();
        for path in program.references() {
            let Some(value) = resolve_path(vars, &path) else {
                return Err(ExprError::ParameterNotFound {
                    path: path.join("."),
                });
            };
            env.insert(path.join("."), value.clone());
        }

        eval::evaluate(&program.root, &env).map_err(|fail| ExprError::Evaluation {
            expr: self.0.clone(),
            detail: fail.0,
        })
    }

    /// Compiles the expression text.
    fn compile(&self) -> Result<parser::Program, ExprError> {
        parser::parse(&self.0).map_err(|detail| ExprError::Invalid {
            expr: self.0.clone(),
            detail,
        })
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Expression {
    fn from(expr: &str) -> Self {
        Self::new(expr)
    }
}

// ============================================================================
// SECTION: Reference Resolution
// ============================================================================

/// Resolves a reference path against the variable map.
///
/// The first segment selects a root variable; remaining segments walk nested
/// objects. Any missing segment (or traversal into a non-object) yields
/// `None`, which the caller reports as a missing parameter.
fn resolve_path<'vars>(vars: &'vars Map<String, Value>, path: &[String]) -> Option<&'vars Value> {
    let (root, rest) = path.split_first()?;
    let mut current = vars.get(root)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
