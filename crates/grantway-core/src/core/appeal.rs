// crates/grantway-core/src/core/appeal.rs
// ============================================================================
// Module: Grantway Appeal Lifecycle
// Description: Appeal record, top-level status transitions, and grant conversion.
// Purpose: Own the appeal's lifecycle from creation through grant or rejection.
// Dependencies: crate::core::{approval, grant, hashing, identifiers, resource, time},
// serde, thiserror, time
// ============================================================================

//! ## Overview
//! An appeal is a request for access to a resource, tracked through a
//! policy-driven approval flow to a terminal decision. This module owns the
//! appeal's own status machine (`pending`, then exactly one of `approved`,
//! `rejected`, `canceled`, with `terminated` for appeals superseded by an
//! extension) and the terminal conversion of an approved appeal into a
//! [`Grant`]. The per-step approval state machine lives in
//! [`crate::runtime`].
//!
//! Appeals are immutable once terminal; every transition checks the starting
//! status and fails with a status-specific error otherwise.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::approval::Approval;
use crate::core::approval::ApprovalStatus;
use crate::core::grant::Grant;
use crate::core::grant::GrantSource;
use crate::core::grant::GrantStatus;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::identifiers::AppealId;
use crate::core::identifiers::GrantId;
use crate::core::identifiers::PolicyId;
use crate::core::identifiers::PolicyVersion;
use crate::core::identifiers::ResourceId;
use crate::core::resource::Resource;
use crate::core::time::DurationParseError;
use crate::core::time::parse_duration;
use crate::runtime::engine::EngineError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default account type applied by [`Appeal::set_defaults`].
pub const DEFAULT_ACCOUNT_TYPE: &str = "user";

/// Duration strings that request permanent access.
const PERMANENT_DURATIONS: [&str; 2] = ["", "0"];

// ============================================================================
// SECTION: Appeal Status
// ============================================================================

/// Appeal lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - `Approved`, `Rejected`, and `Canceled` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealStatus {
    /// Awaiting approval flow resolution.
    #[default]
    Pending,
    /// Every approval resolved positively.
    Approved,
    /// An approval was rejected.
    Rejected,
    /// Withdrawn by the creator before resolution.
    Canceled,
    /// Superseded by a newer appeal (access extension).
    Terminated,
}

// ============================================================================
// SECTION: Appeal Options
// ============================================================================

/// Requested access options.
///
/// # Invariants
/// - `duration` is author text: empty or `"0"` requests permanent access,
///   anything else must parse per [`crate::core::time::parse_duration`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppealOptions {
    /// Requested access duration text.
    #[serde(default)]
    pub duration: String,
}

// ============================================================================
// SECTION: Appeal Errors
// ============================================================================

/// Errors raised by appeal lifecycle operations.
///
/// # Invariants
/// - Variants are stable so callers branch on identity, not message text.
/// - [`AppealError::ActionForbidden`] never reveals the approver list.
#[derive(Debug, Error)]
pub enum AppealError {
    /// The appeal is already approved.
    #[error("appeal already approved")]
    AlreadyApproved,
    /// The appeal is already rejected.
    #[error("appeal already rejected")]
    AlreadyRejected,
    /// The appeal is already canceled.
    #[error("appeal already canceled")]
    AlreadyCanceled,
    /// The appeal is already terminated.
    #[error("appeal already terminated")]
    AlreadyTerminated,
    /// Grant conversion requires an approved appeal.
    #[error("appeal is not approved")]
    NotApproved,
    /// The requested duration failed to parse.
    #[error("invalid appeal duration {raw:?}: {source}")]
    InvalidDuration {
        /// Offending duration text.
        raw: String,
        /// Parse failure detail.
        source: DurationParseError,
    },
    /// No approval with the given name exists on the appeal.
    #[error("approval not found: {name}")]
    ApprovalNotFound {
        /// Requested approval name.
        name: String,
    },
    /// The named approval is not awaiting a decision.
    #[error("approval {name} is not pending (status: {status})")]
    ApprovalNotPending {
        /// Approval name.
        name: String,
        /// Current approval status label.
        status: &'static str,
    },
    /// The actor is not allowed to decide this approval step.
    #[error("actor is not allowed to act on this approval step")]
    ActionForbidden,
    /// The action value is not recognized.
    #[error("invalid action value: {value:?}")]
    InvalidAction {
        /// Offending action text.
        value: String,
    },
    /// Policy fingerprinting failed during initialization.
    #[error("fingerprinting policy: {0}")]
    Fingerprint(#[from] HashError),
    /// The approval engine failed while progressing the appeal.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

// ============================================================================
// SECTION: Approval Actions
// ============================================================================

/// Decision value for an external approval action.
///
/// # Invariants
/// - Variants are stable; unknown wire values are rejected before any state
///   mutation by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealAction {
    /// Approve the named approval step.
    Approve,
    /// Reject the named approval step.
    Reject,
}

impl FromStr for AppealAction {
    type Err = AppealError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(AppealError::InvalidAction {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AppealAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => f.write_str("approve"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

/// External mutation entrypoint for one approval step.
///
/// # Invariants
/// - `actor` must match one of the step's resolved approvers; the engine
///   enforces this at application time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalAction {
    /// Appeal the action targets.
    pub appeal_id: AppealId,
    /// Name of the approval step to decide.
    pub approval_name: String,
    /// Email of the acting approver.
    pub actor: String,
    /// Decision value.
    pub action: AppealAction,
    /// Optional free-text reason, recorded on rejection.
    #[serde(default)]
    pub reason: Option<String>,
}

// ============================================================================
// SECTION: Appeal
// ============================================================================

/// A request for access to a resource, tracked through approval to grant or
/// rejection.
///
/// # Invariants
/// - After `apply_policy`, `approvals.len()` equals the policy's step count
///   and `approvals[i].index == i`.
/// - Terminal appeals (approved, rejected, canceled) refuse further
///   transitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Appeal {
    /// Appeal identifier.
    #[serde(default)]
    pub id: AppealId,
    /// Account requesting access.
    #[serde(default)]
    pub account_id: String,
    /// Account type requesting access.
    #[serde(default)]
    pub account_type: String,
    /// Target resource identifier.
    #[serde(default)]
    pub resource_id: ResourceId,
    /// Target resource snapshot, read by expressions and triggers.
    #[serde(default)]
    pub resource: Option<Resource>,
    /// Requested role.
    #[serde(default)]
    pub role: String,
    /// Requested permissions.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Free-form labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Free-form details, read by expressions.
    #[serde(default)]
    pub details: Map<String, Value>,
    /// Requested access options.
    #[serde(default)]
    pub options: Option<AppealOptions>,
    /// Identity that created the appeal.
    #[serde(default)]
    pub created_by: String,
    /// Arbitrary creator metadata, read by expressions.
    #[serde(default)]
    pub creator: Map<String, Value>,
    /// Policy the appeal was evaluated against.
    #[serde(default)]
    pub policy_id: Option<PolicyId>,
    /// Version of the policy the appeal was evaluated against.
    #[serde(default)]
    pub policy_version: Option<PolicyVersion>,
    /// Canonical fingerprint of the bound policy document.
    #[serde(default)]
    pub policy_hash: Option<HashDigest>,
    /// Overall appeal status.
    #[serde(default)]
    pub status: AppealStatus,
    /// Per-step approval records, in policy step order.
    #[serde(default)]
    pub approvals: Vec<Approval>,
}

impl Appeal {
    /// Fills defaults for unset fields; never touches an already-set field.
    pub fn set_defaults(&mut self) {
        if self.account_type.is_empty() {
            self.account_type = DEFAULT_ACCOUNT_TYPE.to_string();
        }
    }

    /// Returns the first pending approval awaiting a human decision.
    ///
    /// Auto steps never surface here: the engine resolves them synchronously,
    /// so a pending approval with approvers is a genuine decision point.
    #[must_use]
    pub fn next_pending_approval(&self) -> Option<&Approval> {
        self.approvals
            .iter()
            .find(|approval| approval.status == ApprovalStatus::Pending && approval.is_manual())
    }

    /// Returns the approval with the given name, if any.
    #[must_use]
    pub fn approval(&self, name: &str) -> Option<&Approval> {
        self.approvals.iter().find(|approval| approval.name == name)
    }

    /// Transitions a pending appeal to approved.
    ///
    /// # Errors
    ///
    /// Returns the status-specific [`AppealError`] when the appeal is not
    /// pending.
    pub fn approve(&mut self) -> Result<(), AppealError> {
        self.ensure_pending()?;
        self.status = AppealStatus::Approved;
        Ok(())
    }

    /// Transitions a pending appeal to rejected.
    ///
    /// # Errors
    ///
    /// Returns the status-specific [`AppealError`] when the appeal is not
    /// pending.
    pub fn reject(&mut self) -> Result<(), AppealError> {
        self.ensure_pending()?;
        self.status = AppealStatus::Rejected;
        Ok(())
    }

    /// Transitions a pending appeal to canceled.
    ///
    /// # Errors
    ///
    /// Returns the status-specific [`AppealError`] when the appeal is not
    /// pending.
    pub fn cancel(&mut self) -> Result<(), AppealError> {
        self.ensure_pending()?;
        self.status = AppealStatus::Canceled;
        Ok(())
    }

    /// Transitions a pending or approved appeal to terminated.
    ///
    /// Termination marks an appeal superseded by a newer one (an access
    /// extension); the replacement carries the active grant.
    ///
    /// # Errors
    ///
    /// Returns the status-specific [`AppealError`] when the appeal is already
    /// rejected, canceled, or terminated.
    pub fn terminate(&mut self) -> Result<(), AppealError> {
        match self.status {
            AppealStatus::Pending | AppealStatus::Approved => {
                self.status = AppealStatus::Terminated;
                Ok(())
            }
            AppealStatus::Rejected => Err(AppealError::AlreadyRejected),
            AppealStatus::Canceled => Err(AppealError::AlreadyCanceled),
            AppealStatus::Terminated => Err(AppealError::AlreadyTerminated),
        }
    }

    /// Converts an approved appeal into its grant artifact.
    ///
    /// An absent options block, an empty duration, and `"0"` all produce a
    /// permanent grant. Any other duration text must parse; the grant then
    /// expires at `now + duration`. `now` is caller-supplied so the core
    /// never reads the wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`AppealError::NotApproved`] when the appeal is not approved
    /// and [`AppealError::InvalidDuration`] when the duration text fails to
    /// parse. No grant is produced on failure.
    pub fn to_grant(&self, now: OffsetDateTime) -> Result<Grant, AppealError> {
        if self.status != AppealStatus::Approved {
            return Err(AppealError::NotApproved);
        }

        let duration_text = self
            .options
            .as_ref()
            .map_or("", |options| options.duration.as_str());
        let expiration_date = if PERMANENT_DURATIONS.contains(&duration_text) {
            None
        } else {
            let duration =
                parse_duration(duration_text).map_err(|source| AppealError::InvalidDuration {
                    raw: duration_text.to_string(),
                    source,
                })?;
            Some(now + duration)
        };

        Ok(Grant {
            id: GrantId::default(),
            status: GrantStatus::Active,
            source: GrantSource::Appeal,
            account_id: self.account_id.clone(),
            account_type: self.account_type.clone(),
            resource_id: self.resource_id.clone(),
            role: self.role.clone(),
            permissions: self.permissions.clone(),
            is_permanent: expiration_date.is_none(),
            expiration_date,
            appeal_id: self.id.clone(),
            created_by: self.created_by.clone(),
        })
    }

    /// Requires the appeal to be pending, mapping other statuses to errors.
    pub(crate) fn ensure_pending(&self) -> Result<(), AppealError> {
        match self.status {
            AppealStatus::Pending => Ok(()),
            AppealStatus::Approved => Err(AppealError::AlreadyApproved),
            AppealStatus::Rejected => Err(AppealError::AlreadyRejected),
            AppealStatus::Canceled => Err(AppealError::AlreadyCanceled),
            AppealStatus::Terminated => Err(AppealError::AlreadyTerminated),
        }
    }
}
