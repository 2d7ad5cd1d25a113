// crates/grantway-core/tests/matcher.rs
// ============================================================================
// Module: Requirement Matching Tests
// Description: Condition and trigger predicate evaluation over appeals.
// Purpose: Pin the matcher semantics policy services rely on.
// Dependencies: grantway-core, serde_json
// ============================================================================

//! Requirement matcher tests: structural conditions, equality filters, and
//! trigger expressions.

use grantway_core::Appeal;
use grantway_core::Condition;
use grantway_core::Expression;
use grantway_core::MatchCondition;
use grantway_core::MatchError;
use grantway_core::RequirementTrigger;
use grantway_core::Resource;
use serde_json::Map;
use serde_json::json;

type TestResult = Result<(), String>;

/// Builds an appeal targeting a warehouse dataset.
fn appeal() -> Appeal {
    let mut details = Map::new();
    details.insert("owner".to_string(), json!("owner@example.com"));
    details.insert("tier".to_string(), json!(1));

    Appeal {
        role: "viewer".to_string(),
        resource: Some(Resource {
            provider_type: "warehouse".to_string(),
            provider_urn: "warehouse-prod".to_string(),
            resource_type: "dataset".to_string(),
            urn: "datasets/orders".to_string(),
            details,
            ..Resource::default()
        }),
        ..Appeal::default()
    }
}

/// Builds a condition on a resource field.
fn condition(field: &str, eq: serde_json::Value) -> Condition {
    Condition {
        field: field.to_string(),
        matcher: MatchCondition {
            eq,
        },
    }
}

#[test]
fn condition_matches_resource_details() -> TestResult {
    let matched = condition("$resource.details.owner", json!("owner@example.com"))
        .is_match(&appeal())
        .map_err(|err| err.to_string())?;
    if !matched {
        return Err("expected owner condition to match".to_string());
    }

    let matched = condition("$resource.details.tier", json!(2))
        .is_match(&appeal())
        .map_err(|err| err.to_string())?;
    if matched {
        return Err("expected tier condition to mismatch".to_string());
    }
    Ok(())
}

#[test]
fn condition_rejects_unrooted_fields() -> TestResult {
    match condition("details.owner", json!("x")).is_match(&appeal()) {
        Err(MatchError::UnsupportedField {
            field,
        }) if field == "details.owner" => Ok(()),
        other => Err(format!("expected unsupported field error, got {other:?}")),
    }
}

#[test]
fn condition_reports_missing_fields() -> TestResult {
    match condition("$resource.details.missing", json!("x")).is_match(&appeal()) {
        Err(MatchError::FieldNotFound {
            field,
        }) if field == "$resource.details.missing" => Ok(()),
        other => Err(format!("expected field not found error, got {other:?}")),
    }
}

#[test]
fn trigger_filters_combine_as_a_conjunction() -> TestResult {
    let trigger = RequirementTrigger {
        provider_type: Some("warehouse".to_string()),
        resource_type: Some("dataset".to_string()),
        role: Some("viewer".to_string()),
        conditions: vec![condition("$resource.details.owner", json!("owner@example.com"))],
        ..RequirementTrigger::default()
    };
    if !trigger.is_match(&appeal()).map_err(|err| err.to_string())? {
        return Err("expected trigger to match".to_string());
    }

    let mismatched = RequirementTrigger {
        provider_type: Some("dashboard".to_string()),
        ..RequirementTrigger::default()
    };
    if mismatched.is_match(&appeal()).map_err(|err| err.to_string())? {
        return Err("expected provider filter to mismatch".to_string());
    }
    Ok(())
}

#[test]
fn empty_trigger_matches_everything() -> TestResult {
    let trigger = RequirementTrigger::default();
    if trigger.is_match(&appeal()).map_err(|err| err.to_string())? {
        Ok(())
    } else {
        Err("expected empty trigger to match".to_string())
    }
}

#[test]
fn trigger_expression_must_be_boolean() -> TestResult {
    let trigger = RequirementTrigger {
        expression: Some(Expression::new(r#"$appeal.role"#)),
        ..RequirementTrigger::default()
    };
    match trigger.is_match(&appeal()) {
        Err(MatchError::NonBoolean {
            ..
        }) => Ok(()),
        other => Err(format!("expected non-boolean error, got {other:?}")),
    }
}

#[test]
fn trigger_expression_gates_the_match() -> TestResult {
    let matching = RequirementTrigger {
        expression: Some(Expression::new(r#"$appeal.role == "viewer""#)),
        ..RequirementTrigger::default()
    };
    if !matching.is_match(&appeal()).map_err(|err| err.to_string())? {
        return Err("expected expression trigger to match".to_string());
    }

    let excluded = RequirementTrigger {
        expression: Some(Expression::new(r#"$appeal.role == "editor""#)),
        ..RequirementTrigger::default()
    };
    if excluded.is_match(&appeal()).map_err(|err| err.to_string())? {
        return Err("expected expression trigger to mismatch".to_string());
    }
    Ok(())
}

#[test]
fn resource_filters_fail_closed_without_a_resource() -> TestResult {
    let trigger = RequirementTrigger {
        provider_type: Some("warehouse".to_string()),
        ..RequirementTrigger::default()
    };
    let bare = Appeal::default();
    if trigger.is_match(&bare).map_err(|err| err.to_string())? {
        Err("expected resource filter to mismatch without a resource".to_string())
    } else {
        Ok(())
    }
}
