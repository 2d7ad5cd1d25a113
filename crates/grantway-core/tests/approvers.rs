// crates/grantway-core/tests/approvers.rs
// ============================================================================
// Module: Approver Resolution Tests
// Description: Literal and expression-based approver list resolution.
// Purpose: Pin flattening, ordering, and validation semantics.
// Dependencies: grantway-core, serde_json
// ============================================================================

//! Approver resolution tests: literals, `$` expressions, flattening, and
//! email validation failures.

use grantway_core::Appeal;
use grantway_core::ExprError;
use grantway_core::ResolveError;
use grantway_core::Resource;
use grantway_core::Step;
use grantway_core::StepStrategy;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

type TestResult = Result<(), String>;

/// Builds an appeal whose creator and resource details drive resolution.
fn appeal_with_owners(additional_owners: Value) -> Appeal {
    let mut creator = Map::new();
    creator.insert("userManager".to_string(), json!("foo@bar.com"));

    let mut details = Map::new();
    details.insert("owner".to_string(), json!("john.doe@example.com"));
    details.insert("additionalOwners".to_string(), additional_owners);

    Appeal {
        creator,
        resource: Some(Resource {
            details,
            ..Resource::default()
        }),
        ..Appeal::default()
    }
}

/// Builds a manual step with the given approver entries.
fn manual_step(approvers: &[&str]) -> Step {
    Step {
        name: "approval".to_string(),
        description: String::new(),
        strategy: StepStrategy::Manual,
        when: None,
        approve_if: None,
        rejection_reason: None,
        allow_failed: false,
        dependencies: None,
        approvers: approvers.iter().map(ToString::to_string).collect(),
    }
}

#[test]
fn resolves_literals_and_expressions_in_order() -> TestResult {
    let appeal = appeal_with_owners(json!(["moo@cow.fly", "foo@bar.app"]));
    let step = manual_step(&[
        "hello@world.id",
        "$appeal.creator.userManager",
        "$appeal.resource.details.owner",
        "$appeal.resource.details.additionalOwners",
    ]);

    let resolved = step.resolve_approvers(&appeal).map_err(|err| err.to_string())?;
    let expected = vec![
        "hello@world.id".to_string(),
        "foo@bar.com".to_string(),
        "john.doe@example.com".to_string(),
        "moo@cow.fly".to_string(),
        "foo@bar.app".to_string(),
    ];
    if resolved == expected {
        Ok(())
    } else {
        Err(format!("unexpected approver list: {resolved:?}"))
    }
}

#[test]
fn preserves_duplicates() -> TestResult {
    let appeal = appeal_with_owners(json!([]));
    let step = manual_step(&["foo@bar.com", "$appeal.creator.userManager"]);

    let resolved = step.resolve_approvers(&appeal).map_err(|err| err.to_string())?;
    if resolved == vec!["foo@bar.com".to_string(), "foo@bar.com".to_string()] {
        Ok(())
    } else {
        Err(format!("duplicates were not preserved: {resolved:?}"))
    }
}

#[test]
fn fails_on_invalid_expression_entry() -> TestResult {
    let appeal = appeal_with_owners(json!([]));
    let step = manual_step(&["hello@world.id", "$appeal.creator.userManager", "$(*&)(#@*"]);

    match step.resolve_approvers(&appeal) {
        Err(ResolveError::Expression(ExprError::Invalid {
            ..
        })) => Ok(()),
        other => Err(format!("expected expression compile failure, got {other:?}")),
    }
}

#[test]
fn fails_when_resolved_value_is_not_an_email() -> TestResult {
    let mut appeal = appeal_with_owners(json!([]));
    if let Some(resource) = appeal.resource.as_mut() {
        resource.details.insert("owner".to_string(), json!("not-an-email"));
    }
    let step = manual_step(&["hello@world.id", "$appeal.resource.details.owner"]);

    match step.resolve_approvers(&appeal) {
        Err(ResolveError::InvalidEmail {
            value,
        }) if value == "not-an-email" => Ok(()),
        other => Err(format!("expected invalid email error, got {other:?}")),
    }
}

#[test]
fn fails_when_resolved_value_is_not_a_string() -> TestResult {
    let mut appeal = appeal_with_owners(json!([]));
    if let Some(resource) = appeal.resource.as_mut() {
        resource.details.insert("owner".to_string(), json!(42));
    }
    let step = manual_step(&["$appeal.resource.details.owner"]);

    match step.resolve_approvers(&appeal) {
        Err(ResolveError::InvalidType {
            found,
        }) if found == "number" => Ok(()),
        other => Err(format!("expected invalid type error, got {other:?}")),
    }
}

#[test]
fn fails_when_a_list_element_is_not_a_string() -> TestResult {
    let appeal = appeal_with_owners(json!(["moo@cow.fly", 42]));
    let step = manual_step(&["$appeal.resource.details.additionalOwners"]);

    match step.resolve_approvers(&appeal) {
        Err(ResolveError::InvalidType {
            found,
        }) if found == "number" => Ok(()),
        other => Err(format!("expected invalid type error, got {other:?}")),
    }
}

#[test]
fn fails_on_invalid_literal_entry() -> TestResult {
    let appeal = appeal_with_owners(json!([]));
    let step = manual_step(&[")*(@#&_(*)#&)(*"]);

    match step.resolve_approvers(&appeal) {
        Err(ResolveError::InvalidEmail {
            ..
        }) => Ok(()),
        other => Err(format!("expected invalid email error, got {other:?}")),
    }
}

#[test]
fn fails_on_missing_reference_path() -> TestResult {
    let appeal = Appeal::default();
    let step = manual_step(&["$appeal.creator.userManager"]);

    match step.resolve_approvers(&appeal) {
        Err(ResolveError::Expression(ExprError::ParameterNotFound {
            path,
        })) => {
            if path.contains("userManager") {
                Ok(())
            } else {
                Err(format!("path {path:?} does not name the missing field"))
            }
        }
        other => Err(format!("expected parameter not found, got {other:?}")),
    }
}
