// crates/grantway-core/src/runtime/engine.rs
// ============================================================================
// Module: Approval State Machine
// Description: Policy application, approval advancement, and action handling.
// Purpose: Drive each appeal's approvals to a terminal decision deterministically.
// Dependencies: crate::core, crate::expr, crate::runtime::{approvers, context},
// serde_json
// ============================================================================

//! ## Overview
//! The engine walks a policy's steps against an appeal's approvals in a
//! single left-to-right sweep per call. `apply_policy` materializes the
//! approvals once at creation; `advance_approval` progresses them after every
//! event that might unblock a step and is idempotent once no more progress is
//! possible; `apply_action` is the external entrypoint for human decisions.
//!
//! A rejected approval is terminal for the whole appeal: no later call
//! touches any approval again. Dependencies only ever point at earlier steps
//! (enforced at policy validation time), so one sweep suffices and no cycles
//! are possible by construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::core::appeal::Appeal;
use crate::core::appeal::AppealAction;
use crate::core::appeal::AppealError;
use crate::core::appeal::AppealStatus;
use crate::core::appeal::ApprovalAction;
use crate::core::approval::Approval;
use crate::core::approval::ApprovalStatus;
use crate::core::policy::Policy;
use crate::core::policy::Step;
use crate::core::policy::StepStrategy;
use crate::expr::ExprError;
use crate::runtime::approvers::ResolveError;
use crate::runtime::context::ContextError;
use crate::runtime::context::appeal_env;

// ============================================================================
// SECTION: Engine Errors
// ============================================================================

/// Errors raised while progressing an appeal through its policy.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Expression variants carry the step name so failures are traceable
///   without a stack trace.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A step expression failed to compile or evaluate.
    #[error("step {step:?}: {source}")]
    Expression {
        /// Step name.
        step: String,
        /// Underlying expression failure.
        #[source]
        source: ExprError,
    },
    /// A step expression produced a non-boolean where a boolean is required.
    #[error("step {step:?}: expression {expr:?} must evaluate to a boolean")]
    NonBoolean {
        /// Step name.
        step: String,
        /// Offending expression text.
        expr: String,
    },
    /// An auto step has no `approve_if` expression.
    #[error("step {step:?} is an auto step with no approve_if expression")]
    MissingApproveIf {
        /// Step name.
        step: String,
    },
    /// Approver resolution failed for a manual step.
    #[error("resolving approvers for step {step:?}: {source}")]
    Approvers {
        /// Step name.
        step: String,
        /// Underlying resolution failure.
        #[source]
        source: ResolveError,
    },
    /// A step names a dependency that is not declared in the policy.
    #[error("step {step:?} depends on undeclared step {dependency:?}")]
    UnknownDependency {
        /// Step name.
        step: String,
        /// Undeclared dependency name.
        dependency: String,
    },
    /// The approvals array does not match the policy's step count.
    #[error("appeal has {approvals} approvals but policy has {steps} steps")]
    StepCountMismatch {
        /// Approval record count on the appeal.
        approvals: usize,
        /// Step count on the policy.
        steps: usize,
    },
    /// The appeal failed to render into an evaluation context.
    #[error(transparent)]
    Context(#[from] ContextError),
}

// ============================================================================
// SECTION: Step Outcomes
// ============================================================================

/// Outcome of evaluating one eligible step.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StepOutcome {
    /// The step resolved positively.
    Approved,
    /// The step was bypassed (false `when` gate or allowed failure).
    Skipped,
    /// The step rejected the appeal, with the policy's static reason.
    Rejected(Option<String>),
    /// The step awaits an external human decision.
    ManualHold,
}

// ============================================================================
// SECTION: Policy Application
// ============================================================================

impl Appeal {
    /// Initializes the appeal against a policy.
    ///
    /// Sets status pending, binds the policy id, version, and fingerprint,
    /// and materializes the approvals via [`Appeal::apply_policy`]. Callers
    /// run one [`Appeal::advance_approval`] pass afterwards so auto-only
    /// policies resolve at creation.
    ///
    /// # Errors
    ///
    /// Returns [`AppealError`] when fingerprinting or approver resolution
    /// fails; the appeal should be treated as uncreated in that case.
    pub fn init(&mut self, policy: &Policy) -> Result<(), AppealError> {
        self.status = AppealStatus::Pending;
        self.policy_id = Some(policy.id.clone());
        self.policy_version = Some(policy.version);
        self.policy_hash = Some(policy.fingerprint()?);
        self.apply_policy(policy)?;
        Ok(())
    }

    /// Builds the approvals array fresh from the policy's steps.
    ///
    /// Called exactly once, at appeal creation. Manual-step approvers resolve
    /// immediately; a resolution failure aborts the whole call. A step whose
    /// effective dependency set is empty (step 0 with implicit dependencies,
    /// or an explicitly empty list) starts pending; every other step starts
    /// blocked.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Approvers`] when a manual step's approvers fail
    /// to resolve.
    pub fn apply_policy(&mut self, policy: &Policy) -> Result<(), EngineError> {
        let mut approvals = Vec::with_capacity(policy.steps.len());
        for (index, step) in policy.steps.iter().enumerate() {
            let approvers = match step.strategy {
                StepStrategy::Manual => {
                    step.resolve_approvers(self).map_err(|source| EngineError::Approvers {
                        step: step.name.clone(),
                        source,
                    })?
                }
                StepStrategy::Auto => Vec::new(),
            };
            let status = if trivially_satisfied(index, step) {
                ApprovalStatus::Pending
            } else {
                ApprovalStatus::Blocked
            };
            approvals.push(Approval {
                name: step.name.clone(),
                index,
                status,
                approvers,
                actor: None,
                reason: None,
            });
        }
        self.approvals = approvals;
        Ok(())
    }

    /// Progresses the approvals in a single left-to-right sweep.
    ///
    /// Safe to call repeatedly: once no more progress is possible the call
    /// changes nothing. A blocked step whose dependencies all resolved
    /// becomes eligible within the same pass; a skipped step releases its
    /// dependents within the same pass; a pending manual step stops the
    /// sweep. An auto-rejection marks the appeal rejected, and an
    /// all-resolved sweep marks a pending appeal approved.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] on expression failures, non-boolean condition
    /// results, or an approvals/steps length mismatch. Steps already
    /// committed earlier in the pass keep their new statuses.
    pub fn advance_approval(&mut self, policy: &Policy) -> Result<(), EngineError> {
        if self.approvals.len() != policy.steps.len() {
            return Err(EngineError::StepCountMismatch {
                approvals: self.approvals.len(),
                steps: policy.steps.len(),
            });
        }
        if self.approvals.iter().any(|approval| approval.status == ApprovalStatus::Rejected) {
            return Ok(());
        }

        let step_positions: BTreeMap<&str, usize> = policy
            .steps
            .iter()
            .enumerate()
            .map(|(position, step)| (step.name.as_str(), position))
            .collect();

        let mut index = 0;
        while index < self.approvals.len() {
            match self.approvals[index].status {
                ApprovalStatus::Approved | ApprovalStatus::Skipped => {
                    index += 1;
                    continue;
                }
                ApprovalStatus::Blocked => {
                    if !self.dependencies_resolved(policy, index, &step_positions)? {
                        break;
                    }
                }
                ApprovalStatus::Pending => {}
                ApprovalStatus::Rejected => break,
            }

            let step = &policy.steps[index];
            match self.evaluate_step(step)? {
                StepOutcome::Approved => {
                    self.approvals[index].approve();
                    index += 1;
                }
                StepOutcome::Skipped => {
                    self.approvals[index].skip();
                    index += 1;
                }
                StepOutcome::Rejected(reason) => {
                    let approval = &mut self.approvals[index];
                    approval.reject();
                    approval.reason = reason;
                    if self.status == AppealStatus::Pending {
                        self.status = AppealStatus::Rejected;
                    }
                    return Ok(());
                }
                StepOutcome::ManualHold => {
                    if self.approvals[index].status == ApprovalStatus::Blocked {
                        self.approvals[index].status = ApprovalStatus::Pending;
                    }
                    break;
                }
            }
        }

        let all_resolved =
            self.approvals.iter().all(|approval| approval.status.is_resolved());
        if all_resolved && self.status == AppealStatus::Pending {
            self.status = AppealStatus::Approved;
        }
        Ok(())
    }

    /// Applies an external approval action and propagates the result.
    ///
    /// Requires the appeal pending, the named approval pending, and the actor
    /// present in its resolved approver list. Approving re-runs
    /// [`Appeal::advance_approval`]; rejecting marks the appeal rejected and
    /// skips every later non-terminal approval.
    ///
    /// # Errors
    ///
    /// Returns [`AppealError`] on state violations, authorization failures
    /// ([`AppealError::ActionForbidden`], which does not reveal the approver
    /// list), or engine failures during propagation.
    pub fn apply_action(
        &mut self,
        action: &ApprovalAction,
        policy: &Policy,
    ) -> Result<(), AppealError> {
        self.ensure_pending()?;

        let index = self
            .approvals
            .iter()
            .position(|approval| approval.name == action.approval_name)
            .ok_or_else(|| AppealError::ApprovalNotFound {
                name: action.approval_name.clone(),
            })?;

        let approval = &self.approvals[index];
        if approval.status != ApprovalStatus::Pending {
            return Err(AppealError::ApprovalNotPending {
                name: action.approval_name.clone(),
                status: approval.status.as_str(),
            });
        }
        if !approval.approvers.iter().any(|approver| approver == &action.actor) {
            return Err(AppealError::ActionForbidden);
        }

        match action.action {
            AppealAction::Approve => {
                let approval = &mut self.approvals[index];
                approval.approve();
                approval.actor = Some(action.actor.clone());
                self.advance_approval(policy)?;
            }
            AppealAction::Reject => {
                let approval = &mut self.approvals[index];
                approval.reject();
                approval.actor = Some(action.actor.clone());
                approval.reason = action.reason.clone();
                self.status = AppealStatus::Rejected;
                for later in &mut self.approvals[index + 1..] {
                    if !later.status.is_terminal() {
                        later.skip();
                    }
                }
            }
        }
        Ok(())
    }

    /// Checks whether a blocked step's dependencies are all resolved.
    ///
    /// No explicit dependency list means the implicit gate on all preceding
    /// steps; an explicit list waits only on those named earlier steps.
    fn dependencies_resolved(
        &self,
        policy: &Policy,
        index: usize,
        step_positions: &BTreeMap<&str, usize>,
    ) -> Result<bool, EngineError> {
        let step = &policy.steps[index];
        match &step.dependencies {
            None => Ok(self.approvals[..index]
                .iter()
                .all(|approval| approval.status.is_resolved())),
            Some(names) => {
                for name in names {
                    let position = step_positions.get(name.as_str()).ok_or_else(|| {
                        EngineError::UnknownDependency {
                            step: step.name.clone(),
                            dependency: name.clone(),
                        }
                    })?;
                    if !self.approvals[*position].status.is_resolved() {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// Evaluates one eligible step against the current appeal context.
    ///
    /// The context is rendered per step: earlier transitions in the same pass
    /// are visible to later expressions.
    fn evaluate_step(&self, step: &Step) -> Result<StepOutcome, EngineError> {
        let vars = appeal_env(self)?;

        if let Some(when) = &step.when {
            let value = when.evaluate(&vars).map_err(|source| EngineError::Expression {
                step: step.name.clone(),
                source,
            })?;
            let Value::Bool(pass) = value else {
                return Err(EngineError::NonBoolean {
                    step: step.name.clone(),
                    expr: when.as_str().to_string(),
                });
            };
            if !pass {
                return Ok(StepOutcome::Skipped);
            }
        }

        match step.strategy {
            StepStrategy::Manual => Ok(StepOutcome::ManualHold),
            StepStrategy::Auto => {
                let approve_if =
                    step.approve_if.as_ref().ok_or_else(|| EngineError::MissingApproveIf {
                        step: step.name.clone(),
                    })?;
                let value =
                    approve_if.evaluate(&vars).map_err(|source| EngineError::Expression {
                        step: step.name.clone(),
                        source,
                    })?;
                let Value::Bool(approved) = value else {
                    return Err(EngineError::NonBoolean {
                        step: step.name.clone(),
                        expr: approve_if.as_str().to_string(),
                    });
                };
                if approved {
                    Ok(StepOutcome::Approved)
                } else if step.allow_failed {
                    Ok(StepOutcome::Skipped)
                } else {
                    Ok(StepOutcome::Rejected(step.rejection_reason.clone()))
                }
            }
        }
    }
}

/// Returns true when a step's effective dependency set is empty.
fn trivially_satisfied(index: usize, step: &Step) -> bool {
    match &step.dependencies {
        None => index == 0,
        Some(dependencies) => dependencies.is_empty(),
    }
}
