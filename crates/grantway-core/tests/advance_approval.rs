// crates/grantway-core/tests/advance_approval.rs
// ============================================================================
// Module: Approval Advancement Tests
// Description: Sweep semantics, skip/block interaction, and terminality.
// Purpose: Pin the state machine behavior policies rely on.
// Dependencies: grantway-core, serde_json
// ============================================================================

//! Advancement tests: auto resolution, rejection reasons, when-gates,
//! dependencies, idempotence, and terminality.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use grantway_core::Appeal;
use grantway_core::AppealStatus;
use grantway_core::Approval;
use grantway_core::ApprovalStatus;
use grantway_core::EngineError;
use grantway_core::ExprError;
use grantway_core::Expression;
use grantway_core::Policy;
use grantway_core::PolicyId;
use grantway_core::PolicyVersion;
use grantway_core::Resource;
use grantway_core::Step;
use grantway_core::StepStrategy;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Test Fixtures
// ============================================================================

/// Builds a policy around the given steps.
fn policy(steps: Vec<Step>) -> Policy {
    Policy {
        id: PolicyId::new("test-id"),
        version: PolicyVersion::from_raw(1).unwrap(),
        description: String::new(),
        steps,
        requirements: Vec::new(),
        labels: std::collections::BTreeMap::new(),
    }
}

/// Builds an auto step.
fn auto_step(name: &str, approve_if: &str) -> Step {
    Step {
        name: name.to_string(),
        description: String::new(),
        strategy: StepStrategy::Auto,
        when: None,
        approve_if: Some(Expression::new(approve_if)),
        rejection_reason: None,
        allow_failed: false,
        dependencies: None,
        approvers: Vec::new(),
    }
}

/// Builds a manual step with one approver.
fn manual_step(name: &str, approver: &str) -> Step {
    Step {
        name: name.to_string(),
        description: String::new(),
        strategy: StepStrategy::Manual,
        when: None,
        approve_if: None,
        rejection_reason: None,
        allow_failed: false,
        dependencies: None,
        approvers: vec![approver.to_string()],
    }
}

/// Builds an appeal with resource details and materialized approvals.
fn appeal_for(policy: &Policy, details: Value) -> Appeal {
    let details_map: Map<String, Value> = match details {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let mut appeal = Appeal {
        resource: Some(Resource {
            name: "grafana".to_string(),
            details: details_map,
            ..Resource::default()
        }),
        ..Appeal::default()
    };
    appeal.init(policy).unwrap();
    appeal
}

/// Returns the status list of an appeal's approvals.
fn statuses(appeal: &Appeal) -> Vec<ApprovalStatus> {
    appeal.approvals.iter().map(|approval| approval.status).collect()
}

// ============================================================================
// SECTION: Auto Resolution
// ============================================================================

#[test]
fn resolves_multiple_auto_steps_in_one_pass() {
    let owner_check = r#"$appeal.resource.details.owner == "test-owner""#;
    let policy = policy(vec![
        auto_step("step-1", owner_check),
        auto_step("step-2", owner_check),
        auto_step("step-3", owner_check),
    ]);
    let mut appeal = appeal_for(&policy, json!({"owner": "test-owner"}));

    appeal.advance_approval(&policy).unwrap();

    assert_eq!(
        statuses(&appeal),
        vec![ApprovalStatus::Approved, ApprovalStatus::Approved, ApprovalStatus::Approved]
    );
    assert_eq!(appeal.status, AppealStatus::Approved);
}

#[test]
fn autofills_rejection_reason_on_auto_reject() {
    let mut step = auto_step("step-1", "false");
    step.rejection_reason = Some("test rejection reason".to_string());
    let policy = policy(vec![step]);
    let mut appeal = appeal_for(&policy, json!({}));

    appeal.advance_approval(&policy).unwrap();

    assert_eq!(appeal.approvals[0].status, ApprovalStatus::Rejected);
    assert_eq!(appeal.approvals[0].reason.as_deref(), Some("test rejection reason"));
    assert_eq!(appeal.status, AppealStatus::Rejected);
}

#[test]
fn allow_failed_skips_instead_of_rejecting() {
    let mut failing = auto_step("step-1", "false");
    failing.allow_failed = true;
    let policy = policy(vec![failing, auto_step("step-2", "true")]);
    let mut appeal = appeal_for(&policy, json!({}));

    appeal.advance_approval(&policy).unwrap();

    assert_eq!(statuses(&appeal), vec![ApprovalStatus::Skipped, ApprovalStatus::Approved]);
    assert_eq!(appeal.status, AppealStatus::Approved);
}

// ============================================================================
// SECTION: Terminality and Idempotence
// ============================================================================

#[test]
fn does_nothing_once_an_approval_is_rejected() {
    let policy = policy(vec![auto_step("step-1", "true"), auto_step("step-2", "true")]);
    let mut appeal = appeal_for(&policy, json!({}));
    appeal.approvals[0].status = ApprovalStatus::Rejected;
    let before = appeal.approvals.clone();

    appeal.advance_approval(&policy).unwrap();

    assert_eq!(appeal.approvals, before);
}

#[test]
fn advancement_is_idempotent() {
    let policy = policy(vec![
        auto_step("step-1", "true"),
        manual_step("step-2", "human@email.com"),
        auto_step("step-3", "true"),
    ]);
    let mut appeal = appeal_for(&policy, json!({}));

    appeal.advance_approval(&policy).unwrap();
    let first_pass = appeal.approvals.clone();
    appeal.advance_approval(&policy).unwrap();

    assert_eq!(appeal.approvals, first_pass);
    assert_eq!(
        statuses(&appeal),
        vec![ApprovalStatus::Approved, ApprovalStatus::Pending, ApprovalStatus::Blocked]
    );
}

#[test]
fn invalid_expression_aborts_with_step_name() {
    let policy = policy(vec![auto_step("step-1", ")*(&_#)($U#_)(")]);
    let mut appeal = appeal_for(&policy, json!({}));

    match appeal.advance_approval(&policy) {
        Err(EngineError::Expression {
            step,
            source: ExprError::Invalid {
                ..
            },
        }) => assert_eq!(step, "step-1"),
        other => panic!("expected compile failure, got {other:?}"),
    }
    assert_eq!(statuses(&appeal), vec![ApprovalStatus::Pending]);
}

#[test]
fn missing_parameter_aborts_instead_of_panicking() {
    let policy = policy(vec![auto_step("step-1", "$appeal.resource.details.foo == true")]);
    let mut appeal = appeal_for(&policy, json!({"owner": "test-owner"}));

    match appeal.advance_approval(&policy) {
        Err(EngineError::Expression {
            source: ExprError::ParameterNotFound {
                path,
            },
            ..
        }) => assert!(path.contains("foo"), "path {path:?} does not name foo"),
        other => panic!("expected parameter not found, got {other:?}"),
    }
}

#[test]
fn non_boolean_condition_is_an_error() {
    let policy = policy(vec![auto_step("step-1", r#""not a boolean""#)]);
    let mut appeal = appeal_for(&policy, json!({}));

    match appeal.advance_approval(&policy) {
        Err(EngineError::NonBoolean {
            step, ..
        }) => assert_eq!(step, "step-1"),
        other => panic!("expected non-boolean error, got {other:?}"),
    }
}

// ============================================================================
// SECTION: When Gates
// ============================================================================

#[test]
fn false_when_gate_skips_and_unblocks_successor_in_same_pass() {
    let mut gated = manual_step("resourceFlagStep", "user@email.com");
    gated.when = Some(Expression::new("$appeal.resource.details.flag == true"));
    let policy = policy(vec![gated, manual_step("humanApprovalStep", "human@email.com")]);
    let mut appeal = appeal_for(&policy, json!({"flag": false}));

    appeal.advance_approval(&policy).unwrap();

    assert_eq!(statuses(&appeal), vec![ApprovalStatus::Skipped, ApprovalStatus::Pending]);
}

#[test]
fn true_when_gate_leaves_manual_step_pending() {
    let mut gated = manual_step("resourceFlagStep", "user@email.com");
    gated.when = Some(Expression::new("$appeal.resource.details.flag == true"));
    let policy = policy(vec![
        manual_step("humanApprovalStep", "human@email.com"),
        gated,
        manual_step("secondHumanStep", "human@email.com"),
    ]);
    let mut appeal = appeal_for(&policy, json!({"flag": true}));
    appeal.approvals[0].approve();

    appeal.advance_approval(&policy).unwrap();

    assert_eq!(
        statuses(&appeal),
        vec![ApprovalStatus::Approved, ApprovalStatus::Pending, ApprovalStatus::Blocked]
    );
}

// ============================================================================
// SECTION: Dependencies
// ============================================================================

#[test]
fn explicit_dependency_releases_once_named_step_resolves() {
    let mut fan_in = auto_step("step-3", "true");
    fan_in.dependencies = Some(vec!["step-1".to_string()]);
    let mut gated = manual_step("step-2", "user@email.com");
    gated.when = Some(Expression::new("$appeal.resource.details.flag == true"));
    let policy = policy(vec![auto_step("step-1", "true"), gated, fan_in]);
    let mut appeal = appeal_for(&policy, json!({"flag": false}));

    appeal.advance_approval(&policy).unwrap();

    // step-2's gate is false, so the sweep skips it and reaches step-3,
    // whose only dependency (step-1) resolved in the same pass.
    assert_eq!(
        statuses(&appeal),
        vec![ApprovalStatus::Approved, ApprovalStatus::Skipped, ApprovalStatus::Approved]
    );
    assert_eq!(appeal.status, AppealStatus::Approved);
}

#[test]
fn pending_manual_step_stops_the_sweep() {
    let mut fan_in = auto_step("step-3", "true");
    fan_in.dependencies = Some(vec!["step-1".to_string()]);
    let policy = policy(vec![
        auto_step("step-1", "true"),
        manual_step("step-2", "user@email.com"),
        fan_in,
    ]);
    let mut appeal = appeal_for(&policy, json!({}));

    appeal.advance_approval(&policy).unwrap();

    assert_eq!(
        statuses(&appeal),
        vec![ApprovalStatus::Approved, ApprovalStatus::Pending, ApprovalStatus::Blocked]
    );
}

#[test]
fn unresolved_explicit_dependency_stays_blocked() {
    let mut dependent = auto_step("step-2", "true");
    dependent.dependencies = Some(vec!["step-1".to_string()]);
    let policy = policy(vec![manual_step("step-1", "user@email.com"), dependent]);
    let mut appeal = appeal_for(&policy, json!({}));

    appeal.advance_approval(&policy).unwrap();

    assert_eq!(statuses(&appeal), vec![ApprovalStatus::Pending, ApprovalStatus::Blocked]);
}

#[test]
fn empty_dependency_list_starts_pending() {
    let mut independent = manual_step("step-2", "user@email.com");
    independent.dependencies = Some(Vec::new());
    let policy = policy(vec![manual_step("step-1", "user@email.com"), independent]);
    let appeal = appeal_for(&policy, json!({}));

    assert_eq!(statuses(&appeal), vec![ApprovalStatus::Pending, ApprovalStatus::Pending]);
}

#[test]
fn step_count_mismatch_is_rejected() {
    let policy_two = policy(vec![auto_step("step-1", "true"), auto_step("step-2", "true")]);
    let policy_one = policy(vec![auto_step("step-1", "true")]);
    let mut appeal = appeal_for(&policy_one, json!({}));

    match appeal.advance_approval(&policy_two) {
        Err(EngineError::StepCountMismatch {
            approvals,
            steps,
        }) => {
            assert_eq!(approvals, 1);
            assert_eq!(steps, 2);
        }
        other => panic!("expected step count mismatch, got {other:?}"),
    }
}

// ============================================================================
// SECTION: Empty Policies
// ============================================================================

#[test]
fn empty_policy_resolves_vacuously() {
    let policy = policy(Vec::new());
    let mut appeal = appeal_for(&policy, json!({}));

    assert_eq!(appeal.approvals, Vec::<Approval>::new());
    appeal.advance_approval(&policy).unwrap();
    assert_eq!(appeal.status, AppealStatus::Approved);
}
