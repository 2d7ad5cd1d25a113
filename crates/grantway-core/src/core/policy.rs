// crates/grantway-core/src/core/policy.rs
// ============================================================================
// Module: Grantway Policy Model
// Description: Declarative approval policy, steps, and requirement triggers.
// Purpose: Describe the approval flow an appeal must pass before a grant.
// Dependencies: crate::core::{appeal, hashing, identifiers}, crate::expr, serde
// ============================================================================

//! ## Overview
//! A policy is an immutable (id, version) pair holding an ordered sequence of
//! approval steps. Steps resolve in array order: a step with no explicit
//! `dependencies` is implicitly gated on all syntactically preceding steps
//! having resolved, while an explicit list waits on that named subset of
//! earlier steps (fan-in). Structural validation is a loader concern
//! (`grantway-config`); this module is data plus fingerprinting.
//!
//! A policy version, once referenced by any appeal, must never be mutated;
//! [`Policy::fingerprint`] lets callers verify that after the fact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::appeal::AppealOptions;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_value;
use crate::core::identifiers::PolicyId;
use crate::core::identifiers::PolicyVersion;
use crate::core::identifiers::ResourceId;
use crate::expr::Expression;

// ============================================================================
// SECTION: Step Strategy
// ============================================================================

/// Resolution mode for a policy step.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStrategy {
    /// Decided by evaluating the step's `approve_if` expression.
    Auto,
    /// Decided by a human from the step's resolved approver list.
    Manual,
}

// ============================================================================
// SECTION: Step
// ============================================================================

/// One stage of an approval flow.
///
/// # Invariants
/// - `strategy == Auto` implies `approve_if` is present and `approvers` is
///   empty; `strategy == Manual` implies `approvers` is non-empty. The loader
///   enforces this before a policy reaches the engine.
/// - `dependencies` entries name strictly earlier steps; `None` means the
///   implicit all-preceding gate, `Some(vec![])` means no gate at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step name, unique within the policy.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Resolution strategy.
    pub strategy: StepStrategy,
    /// Optional gating expression, evaluated before either strategy.
    #[serde(default)]
    pub when: Option<Expression>,
    /// Approval expression for auto steps.
    #[serde(default)]
    pub approve_if: Option<Expression>,
    /// Static rejection reason recorded when an auto step evaluates false.
    #[serde(default)]
    pub rejection_reason: Option<String>,
    /// Skip instead of rejecting when an auto step evaluates false.
    #[serde(default)]
    pub allow_failed: bool,
    /// Names of steps that must resolve before this one becomes eligible.
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
    /// Approver entries for manual steps: literal emails or `$` expressions.
    #[serde(default)]
    pub approvers: Vec<String>,
}

// ============================================================================
// SECTION: Requirement Triggers
// ============================================================================

/// Expected value for a structural condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCondition {
    /// Value the condition field must equal.
    pub eq: Value,
}

/// Structural predicate over an appeal's resource.
///
/// # Invariants
/// - `field` is a `$resource.`-rooted dot path; anything else fails matching
///   with an unsupported-field error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dot path into the flattened resource (e.g. `$resource.details.owner`).
    pub field: String,
    /// Expected-value matcher.
    #[serde(rename = "match")]
    pub matcher: MatchCondition,
}

/// Predicate deciding whether a supplementary requirement applies.
///
/// Declared filters combine as a conjunction: every present equality filter,
/// every condition, and the optional expression must all hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementTrigger {
    /// Provider type the resource must belong to.
    #[serde(default)]
    pub provider_type: Option<String>,
    /// Provider URN the resource must belong to.
    #[serde(default)]
    pub provider_urn: Option<String>,
    /// Resource type the appeal must target.
    #[serde(default)]
    pub resource_type: Option<String>,
    /// Resource URN the appeal must target.
    #[serde(default)]
    pub resource_urn: Option<String>,
    /// Role the appeal must request.
    #[serde(default)]
    pub role: Option<String>,
    /// Structural conditions over the resource.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Free-form boolean expression over the appeal context.
    #[serde(default)]
    pub expression: Option<Expression>,
}

/// Identifies a resource for a supplementary appeal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    /// Resource identifier, when known directly.
    #[serde(default)]
    pub id: Option<ResourceId>,
    /// Provider type of the target resource.
    #[serde(default)]
    pub provider_type: String,
    /// Provider URN of the target resource.
    #[serde(default)]
    pub provider_urn: String,
    /// Resource type of the target resource.
    #[serde(default, rename = "type")]
    pub resource_type: String,
    /// Resource URN of the target resource.
    #[serde(default)]
    pub urn: String,
}

/// Reference to the policy governing a supplementary appeal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyReference {
    /// Referenced policy identifier.
    pub id: PolicyId,
    /// Referenced policy version.
    pub version: PolicyVersion,
}

/// Supplementary appeal created when a requirement trigger matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalAppeal {
    /// Target resource of the supplementary appeal.
    pub resource: ResourceIdentifier,
    /// Requested role.
    pub role: String,
    /// Requested options.
    #[serde(default)]
    pub options: Option<AppealOptions>,
    /// Policy override for the supplementary appeal.
    #[serde(default)]
    pub policy: Option<PolicyReference>,
}

/// Supplementary-appeal rule: when the trigger matches, file these appeals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Trigger predicate.
    pub on: RequirementTrigger,
    /// Appeals to file when the trigger matches.
    pub appeals: Vec<AdditionalAppeal>,
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Versioned, ordered approval policy.
///
/// # Invariants
/// - `(id, version)` pairs are immutable once referenced by an appeal.
/// - `steps` order is the evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy identifier.
    pub id: PolicyId,
    /// Policy version (non-zero).
    pub version: PolicyVersion,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Ordered approval steps; may be empty (zero approvals).
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Supplementary-appeal rules.
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    /// Free-form labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Policy {
    /// Computes the canonical fingerprint of this policy document.
    ///
    /// The fingerprint is stable across map key order and formatting, so an
    /// appeal can pin the exact document it was evaluated against.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the policy cannot be canonically serialized.
    pub fn fingerprint(&self) -> Result<HashDigest, HashError> {
        hash_canonical_value(DEFAULT_HASH_ALGORITHM, self)
    }
}
