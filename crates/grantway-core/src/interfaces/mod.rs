// crates/grantway-core/src/interfaces/mod.rs
// ============================================================================
// Module: Grantway Interfaces
// Description: Backend-agnostic interfaces for providers, policies, and notification.
// Purpose: Define the contract surfaces the approval engine's callers plug into.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how Grantway integrates with external systems without
//! embedding backend-specific details. The engine itself never calls a
//! provider: it hands a finished [`Grant`] to the host, which executes it
//! through [`AccessProvider`] strictly after the state machine commits.
//! Implementations must be deterministic where possible and fail closed on
//! missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::AppealId;
use crate::core::grant::Grant;
use crate::core::identifiers::PolicyId;
use crate::core::identifiers::PolicyVersion;
use crate::core::policy::Policy;

// ============================================================================
// SECTION: Access Provider
// ============================================================================

/// Access provider errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected or failed the access change.
    #[error("access provider error: {0}")]
    Provider(String),
}

/// Executes grants against the external system owning a resource.
pub trait AccessProvider {
    /// Applies a grant in the external system.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the provider cannot apply the grant.
    fn grant_access(&self, grant: &Grant) -> Result<(), ProviderError>;

    /// Revokes a grant in the external system.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the provider cannot revoke the grant.
    fn revoke_access(&self, grant: &Grant) -> Result<(), ProviderError>;
}

// ============================================================================
// SECTION: Policy Store
// ============================================================================

/// Policy store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum PolicyStoreError {
    /// Store I/O error.
    #[error("policy store io error: {0}")]
    Io(String),
    /// Store data is invalid.
    #[error("policy store invalid data: {0}")]
    Invalid(String),
}

/// Read access to versioned policy documents.
///
/// A stored (id, version) pair is immutable once referenced by an appeal;
/// stores must never return a mutated document for an existing version.
pub trait PolicyStore {
    /// Loads a policy by identifier and version.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyStoreError`] when loading fails.
    fn get(
        &self,
        id: &PolicyId,
        version: PolicyVersion,
    ) -> Result<Option<Policy>, PolicyStoreError>;
}

// ============================================================================
// SECTION: Notifier
// ============================================================================

/// Notification kinds emitted around approval flow events.
///
/// # Invariants
/// - Variants are stable for serialization and template selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// An approver has a pending decision waiting.
    ApproverNotification,
    /// The appeal was approved.
    AppealApproved,
    /// The appeal was rejected.
    AppealRejected,
}

/// Notification addressed to a single recipient.
///
/// # Invariants
/// - `user` is the recipient email; content fields are safe metadata only
///   (no expression values or approver lists beyond the recipient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient email.
    pub user: String,
    /// Notification kind.
    pub kind: NotificationKind,
    /// Appeal the notification refers to.
    pub appeal_id: AppealId,
    /// Resource name for display.
    pub resource_name: String,
    /// Requested role for display.
    pub role: String,
    /// Requesting identity for display.
    pub requestor: String,
}

/// Notifier errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The notifier failed to deliver.
    #[error("notifier error: {0}")]
    Delivery(String),
}

/// Delivers notifications to approvers and requestors.
pub trait Notifier {
    /// Sends a batch of notifications.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when delivery fails.
    fn notify(&self, notifications: &[Notification]) -> Result<(), NotifyError>;
}
