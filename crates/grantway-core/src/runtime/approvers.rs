// crates/grantway-core/src/runtime/approvers.rs
// ============================================================================
// Module: Approver Resolution
// Description: Turn step approver entries into validated email lists.
// Purpose: Resolve literal emails and $-expressions against appeal data.
// Dependencies: crate::core::{appeal, policy}, crate::expr, crate::runtime::context,
// serde_json
// ============================================================================

//! ## Overview
//! A manual step declares approvers as literal emails and/or `$`-prefixed
//! expressions over the appeal context. An expression may resolve to a single
//! string or a list of strings; lists flatten into the output in order.
//! Every value, literal or resolved, must pass email validation, and the
//! first invalid one aborts resolution naming the offending value. Duplicates
//! are preserved; de-duplication is a caller concern.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::appeal::Appeal;
use crate::core::policy::Step;
use crate::expr::ExprError;
use crate::expr::Expression;
use crate::runtime::context::ContextError;
use crate::runtime::context::appeal_env;

// ============================================================================
// SECTION: Resolution Errors
// ============================================================================

/// Errors raised while resolving step approvers.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `InvalidEmail` names the offending value.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A literal or resolved value is not a valid email address.
    #[error("approver {value:?} is not a valid email")]
    InvalidEmail {
        /// Offending value.
        value: String,
    },
    /// An expression resolved to an unsupported type.
    #[error("invalid approver type, expected an email string or a list of email strings, found {found}")]
    InvalidType {
        /// Type label of the offending value.
        found: &'static str,
    },
    /// The appeal failed to render into an evaluation context.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// An approver expression failed to compile or evaluate.
    #[error("evaluating approvers expression: {0}")]
    Expression(#[from] ExprError),
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

impl Step {
    /// Resolves this step's approver entries against an appeal.
    ///
    /// Output order matches input order; expression lists flatten in place.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when an entry fails email validation, an
    /// expression fails, or a resolved value has an unsupported type.
    pub fn resolve_approvers(&self, appeal: &Appeal) -> Result<Vec<String>, ResolveError> {
        let mut approvers = Vec::with_capacity(self.approvers.len());

        for entry in &self.approvers {
            if entry.starts_with('$') {
                let expression = Expression::new(entry.clone());
                let vars = appeal_env(appeal)?;
                let resolved = expression.evaluate(&vars)?;
                push_resolved(&mut approvers, resolved)?;
            } else {
                push_email(&mut approvers, entry.clone())?;
            }
        }

        Ok(approvers)
    }
}

/// Flattens a resolved expression value into the approver list.
fn push_resolved(approvers: &mut Vec<String>, resolved: Value) -> Result<(), ResolveError> {
    match resolved {
        Value::String(email) => push_email(approvers, email),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(email) => push_email(approvers, email)?,
                    other => {
                        return Err(ResolveError::InvalidType {
                            found: value_type(&other),
                        });
                    }
                }
            }
            Ok(())
        }
        other => Err(ResolveError::InvalidType {
            found: value_type(&other),
        }),
    }
}

/// Validates and appends one email value.
fn push_email(approvers: &mut Vec<String>, email: String) -> Result<(), ResolveError> {
    if !is_valid_email(&email) {
        return Err(ResolveError::InvalidEmail {
            value: email,
        });
    }
    approvers.push(email);
    Ok(())
}

/// Returns a stable type label for error messages.
const fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

// ============================================================================
// SECTION: Email Validation
// ============================================================================

/// Validates an email address: one `@`, a non-empty local part, and a
/// dotted domain of non-empty labels.
///
/// This is a syntax gate, not deliverability: it exists to catch policy
/// typos and expression results that are not addresses at all.
#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || domain.len() < 3 || domain.len() > 255 {
        return false;
    }
    if !local.chars().all(is_local_char) || local.starts_with('.') || local.ends_with('.') {
        return false;
    }
    if local.contains("..") || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

/// Returns true for characters allowed in the local part.
const fn is_local_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '.' | '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '/' | '=' | '?' | '^'
                | '_' | '`' | '{' | '|' | '}' | '~'
        )
}
