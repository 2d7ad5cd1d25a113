// crates/grantway-core/src/core/resource.rs
// ============================================================================
// Module: Grantway Resource Snapshot
// Description: Resource metadata read by policy expressions and triggers.
// Purpose: Carry provider-agnostic resource data into approval evaluation.
// Dependencies: crate::core::identifiers, serde, serde_json
// ============================================================================

//! ## Overview
//! A resource snapshot describes the target of an appeal: which provider owns
//! it, how the provider addresses it, and arbitrary provider-reported details.
//! The approval engine never contacts the provider; it only reads this
//! snapshot through flattened expression contexts and trigger matching.
//!
//! Security posture: `details` values originate from external providers and
//! are treated as untrusted data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::ResourceId;

// ============================================================================
// SECTION: Resource
// ============================================================================

/// Snapshot of the resource an appeal requests access to.
///
/// # Invariants
/// - `provider_type`/`provider_urn` identify the registered provider.
/// - `details` is an arbitrary nested map; the core never interprets it
///   beyond expression field access.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource identifier.
    #[serde(default)]
    pub id: ResourceId,
    /// Provider type owning the resource (e.g. a warehouse or dashboard kind).
    #[serde(default)]
    pub provider_type: String,
    /// Provider instance URN.
    #[serde(default)]
    pub provider_urn: String,
    /// Resource type within the provider.
    #[serde(default, rename = "type")]
    pub resource_type: String,
    /// Resource URN within the provider.
    #[serde(default)]
    pub urn: String,
    /// Human-readable resource name.
    #[serde(default)]
    pub name: String,
    /// Arbitrary provider-reported details.
    #[serde(default)]
    pub details: Map<String, Value>,
}
