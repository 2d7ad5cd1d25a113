// crates/grantway-core/src/core/grant.rs
// ============================================================================
// Module: Grantway Grant Artifact
// Description: Terminal access artifact produced from an approved appeal.
// Purpose: Hand a complete, immutable grant record to the provider interface.
// Dependencies: crate::core::identifiers, serde, time
// ============================================================================

//! ## Overview
//! A grant is the terminal artifact of the approval workflow: it records who
//! gets which role on which resource and for how long. Grants are created
//! once by [`crate::core::appeal::Appeal::to_grant`] and never mutated by the
//! engine; revocation is a provider-side concern behind
//! [`crate::interfaces::AccessProvider`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::AppealId;
use crate::core::identifiers::GrantId;
use crate::core::identifiers::ResourceId;

// ============================================================================
// SECTION: Grant Status
// ============================================================================

/// Grant lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// Access is in effect.
    Active,
    /// Access has been revoked or has expired.
    Inactive,
}

// ============================================================================
// SECTION: Grant Source
// ============================================================================

/// Origin of a grant record.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSource {
    /// Produced by an approved appeal.
    Appeal,
    /// Imported from pre-existing provider-side access.
    Import,
}

// ============================================================================
// SECTION: Grant
// ============================================================================

/// Time-bounded access artifact produced from an approved appeal.
///
/// # Invariants
/// - `is_permanent` implies `expiration_date` is `None`.
/// - Account, resource, role, permission, and creator fields are copied
///   verbatim from the originating appeal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    /// Grant identifier, assigned by the persistence layer.
    #[serde(default)]
    pub id: GrantId,
    /// Grant lifecycle status.
    pub status: GrantStatus,
    /// Origin of the grant record.
    pub source: GrantSource,
    /// Account receiving access.
    pub account_id: String,
    /// Account type receiving access.
    pub account_type: String,
    /// Resource the access applies to.
    pub resource_id: ResourceId,
    /// Granted role.
    pub role: String,
    /// Granted permissions.
    pub permissions: Vec<String>,
    /// Indicates access with no expiration.
    pub is_permanent: bool,
    /// Expiration timestamp for time-bounded access.
    #[serde(with = "time::serde::rfc3339::option")]
    pub expiration_date: Option<OffsetDateTime>,
    /// Originating appeal.
    pub appeal_id: AppealId,
    /// Identity that created the originating appeal.
    pub created_by: String,
}
