// crates/grantway-core/src/runtime/matcher.rs
// ============================================================================
// Module: Requirement Matching
// Description: Predicate evaluation for supplementary policy requirements.
// Purpose: Decide whether a requirement trigger applies to an appeal.
// Dependencies: crate::core, crate::expr, crate::runtime::context, serde_json
// ============================================================================

//! ## Overview
//! Requirement triggers combine structural conditions, equality filters over
//! the appeal's resource and role, and optional free-form expressions into a
//! conjunction. They run outside the core approval loop: policy services use
//! them to decide whether filing supplementary appeals is required.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::appeal::Appeal;
use crate::core::policy::Condition;
use crate::core::policy::RequirementTrigger;
use crate::core::resource::Resource;
use crate::expr::ExprError;
use crate::expr::values_equal;
use crate::runtime::context::ContextError;
use crate::runtime::context::appeal_env;

// ============================================================================
// SECTION: Match Errors
// ============================================================================

/// Errors raised while matching conditions and triggers.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The condition field is not a supported dot path.
    #[error("unable to parse condition field {field:?}")]
    UnsupportedField {
        /// Offending field text.
        field: String,
    },
    /// The condition field does not exist on the appeal's resource.
    #[error("condition field {field:?} not found on resource")]
    FieldNotFound {
        /// Offending field text.
        field: String,
    },
    /// The resource failed to render into a value tree.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// The trigger expression failed to compile or evaluate.
    #[error("evaluating requirement expression: {0}")]
    Expression(#[from] ExprError),
    /// The trigger expression produced a non-boolean.
    #[error("requirement expression {expr:?} must evaluate to a boolean")]
    NonBoolean {
        /// Offending expression text.
        expr: String,
    },
}

// ============================================================================
// SECTION: Condition Matching
// ============================================================================

/// Root prefix for structural condition fields.
const RESOURCE_FIELD_PREFIX: &str = "$resource.";

impl Condition {
    /// Evaluates this condition against an appeal's resource.
    ///
    /// The field must be a `$resource.`-rooted dot path; the addressed value
    /// is compared for equality (decimal-aware for numbers) against the
    /// matcher's expected value.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::UnsupportedField`] for fields outside the
    /// `$resource.` root and [`MatchError::FieldNotFound`] when the path does
    /// not exist on the resource.
    pub fn is_match(&self, appeal: &Appeal) -> Result<bool, MatchError> {
        let Some(path) = self.field.strip_prefix(RESOURCE_FIELD_PREFIX) else {
            return Err(MatchError::UnsupportedField {
                field: self.field.clone(),
            });
        };
        let Some(resource) = appeal.resource.as_ref() else {
            return Err(MatchError::FieldNotFound {
                field: self.field.clone(),
            });
        };

        let rendered = render_resource(resource)?;
        let mut current = &rendered;
        for segment in path.split('.') {
            current = current
                .as_object()
                .and_then(|object| object.get(segment))
                .ok_or_else(|| MatchError::FieldNotFound {
                    field: self.field.clone(),
                })?;
        }
        Ok(values_equal(current, &self.matcher.eq))
    }
}

/// Renders a resource snapshot into a value tree.
fn render_resource(resource: &Resource) -> Result<Value, MatchError> {
    serde_json::to_value(resource).map_err(|err| MatchError::Context(ContextError::Render(err)))
}

// ============================================================================
// SECTION: Trigger Matching
// ============================================================================

impl RequirementTrigger {
    /// Evaluates this trigger against an appeal.
    ///
    /// Every declared filter must hold: resource/provider/role equality,
    /// each structural condition, and the optional expression (which must
    /// evaluate to a boolean). A trigger with nothing declared matches
    /// everything.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError`] when a condition field is unsupported or
    /// missing, or the expression fails or produces a non-boolean.
    pub fn is_match(&self, appeal: &Appeal) -> Result<bool, MatchError> {
        if !self.resource_filters_match(appeal) {
            return Ok(false);
        }

        for condition in &self.conditions {
            if !condition.is_match(appeal)? {
                return Ok(false);
            }
        }

        if let Some(expression) = &self.expression {
            let vars = appeal_env(appeal).map_err(MatchError::Context)?;
            let value = expression.evaluate(&vars)?;
            let Value::Bool(matched) = value else {
                return Err(MatchError::NonBoolean {
                    expr: expression.as_str().to_string(),
                });
            };
            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Checks the declared equality filters against the appeal's resource.
    fn resource_filters_match(&self, appeal: &Appeal) -> bool {
        let role_matches =
            self.role.as_ref().is_none_or(|expected| expected == &appeal.role);
        if !role_matches {
            return false;
        }

        let has_resource_filter = self.provider_type.is_some()
            || self.provider_urn.is_some()
            || self.resource_type.is_some()
            || self.resource_urn.is_some();
        let Some(resource) = appeal.resource.as_ref() else {
            return !has_resource_filter;
        };

        self.provider_type.as_ref().is_none_or(|expected| expected == &resource.provider_type)
            && self.provider_urn.as_ref().is_none_or(|expected| expected == &resource.provider_urn)
            && self
                .resource_type
                .as_ref()
                .is_none_or(|expected| expected == &resource.resource_type)
            && self.resource_urn.as_ref().is_none_or(|expected| expected == &resource.urn)
    }
}
