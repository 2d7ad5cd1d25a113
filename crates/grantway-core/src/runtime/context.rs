// crates/grantway-core/src/runtime/context.rs
// ============================================================================
// Module: Evaluation Context
// Description: Deterministic flattening of appeals into expression variables.
// Purpose: Give the expression evaluator a value tree instead of native structs.
// Dependencies: crate::core::appeal, serde_json
// ============================================================================

//! ## Overview
//! Expressions never touch native structs. Before each evaluation the appeal
//! (with its resource snapshot) is rendered once into a `serde_json::Value`
//! tree and exposed under the `appeal` root, so `$appeal.resource.details.*`,
//! `$appeal.creator.*`, and `$appeal.details.*` resolve by plain map walks.
//! Rendering is deterministic; a serialization failure surfaces as a wrapped
//! error, never a panic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::appeal::Appeal;

// ============================================================================
// SECTION: Context Errors
// ============================================================================

/// Errors raised while building an evaluation context.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The appeal failed to serialize into a value tree.
    #[error("rendering appeal to evaluation context: {0}")]
    Render(#[from] serde_json::Error),
    /// The appeal serialized to something other than an object.
    #[error("appeal did not render to an object")]
    NotAnObject,
}

// ============================================================================
// SECTION: Context Construction
// ============================================================================

/// Renders the appeal into expression variables under the `appeal` root.
///
/// # Errors
///
/// Returns [`ContextError`] when the appeal cannot be rendered to an object.
pub fn appeal_env(appeal: &Appeal) -> Result<Map<String, Value>, ContextError> {
    let rendered = serde_json::to_value(appeal)?;
    if !rendered.is_object() {
        return Err(ContextError::NotAnObject);
    }
    let mut vars = Map::new();
    vars.insert("appeal".to_string(), rendered);
    Ok(vars)
}
