// crates/grantway-core/src/core/approval.rs
// ============================================================================
// Module: Grantway Approval Records
// Description: Runtime record of one policy step's resolution for one appeal.
// Purpose: Track per-step status through the approval state machine.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Each appeal carries one approval per policy step, in step order, linked by
//! positional index. Statuses move `pending -> {approved | rejected}` and
//! `blocked -> {pending | skipped}`; `skipped` and the two decisions are
//! sinks. The transitions here are mechanical; eligibility and expression
//! evaluation live in the runtime engine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Approval Status
// ============================================================================

/// Status of a single approval record.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting resolution (eligible for evaluation or a human decision).
    #[default]
    Pending,
    /// Waiting on unresolved dependency steps.
    Blocked,
    /// Bypassed by a false `when` gate or an allowed failure.
    Skipped,
    /// Decided positively.
    Approved,
    /// Decided negatively; terminal for the whole appeal.
    Rejected,
}

impl ApprovalStatus {
    /// Returns true when the status counts as resolved for dependents.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Approved | Self::Skipped)
    }

    /// Returns true when no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Skipped)
    }

    /// Returns the stable wire label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Blocked => "blocked",
            Self::Skipped => "skipped",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

// ============================================================================
// SECTION: Approval
// ============================================================================

/// Runtime record of one step's resolution for one appeal.
///
/// # Invariants
/// - `index` equals the record's position in the appeal's approvals array and
///   the corresponding step's position in the policy.
/// - `approvers` is the resolved email list for manual steps, empty for auto.
/// - `actor` is set only by an external approval action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    /// Step name this record resolves.
    pub name: String,
    /// Positional index matching the policy step order.
    pub index: usize,
    /// Current status.
    pub status: ApprovalStatus,
    /// Resolved approver emails for manual steps.
    #[serde(default)]
    pub approvers: Vec<String>,
    /// Identity that decided the approval, when decided by a human.
    #[serde(default)]
    pub actor: Option<String>,
    /// Rejection reason (auto-reject static text or manual free text).
    #[serde(default)]
    pub reason: Option<String>,
}

impl Approval {
    /// Returns true when this approval awaits a human decision.
    #[must_use]
    pub fn is_manual(&self) -> bool {
        !self.approvers.is_empty()
    }

    /// Marks the approval approved.
    pub fn approve(&mut self) {
        self.status = ApprovalStatus::Approved;
    }

    /// Marks the approval rejected.
    pub fn reject(&mut self) {
        self.status = ApprovalStatus::Rejected;
    }

    /// Marks the approval skipped.
    pub fn skip(&mut self) {
        self.status = ApprovalStatus::Skipped;
    }
}
