// crates/grantway-core/src/expr/eval.rs
// ============================================================================
// Module: Expression Evaluation
// Description: Tree-walking evaluation over JSON values.
// Purpose: Turn compiled expressions into deterministic values.
// Dependencies: bigdecimal, serde_json, time
// ============================================================================

//! ## Overview
//! Evaluation walks the parsed tree over `serde_json::Value` operands.
//! Numeric comparison and arithmetic are decimal-aware; RFC3339 strings order
//! temporally under ordering comparators, other strings lexicographically.
//! Type errors fail evaluation rather than coercing; the engine layer decides
//! what a non-boolean outcome means.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde_json::Number;
use serde_json::Value;
use time::Date;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::expr::parser::BinaryOp;
use crate::expr::parser::Expr;
use crate::expr::parser::UnaryOp;

// ============================================================================
// SECTION: Evaluation Failure
// ============================================================================

/// Evaluation failure detail, wrapped with expression text by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EvalFailure(pub String);

/// Builds an evaluation failure from a detail message.
fn failure(detail: impl Into<String>) -> EvalFailure {
    EvalFailure(detail.into())
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates an expression node against resolved reference values.
///
/// `env` maps dot-joined reference paths to their resolved values; the
/// pre-execution scan guarantees every referenced path is present.
pub(crate) fn evaluate(
    expr: &Expr,
    env: &BTreeMap<String, Value>,
) -> Result<Value, EvalFailure> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(evaluate(item, env)?);
            }
            Ok(Value::Array(out))
        }
        Expr::Reference(path) => {
            let key = path.join(".");
            env.get(&key)
                .cloned()
                .ok_or_else(|| failure(format!("unresolved reference ${key}")))
        }
        Expr::Unary {
            op,
            operand,
        } => evaluate_unary(*op, operand, env),
        Expr::Binary {
            op,
            left,
            right,
        } => evaluate_binary(*op, left, right, env),
    }
}

/// Evaluates a unary operation.
fn evaluate_unary(
    op: UnaryOp,
    operand: &Expr,
    env: &BTreeMap<String, Value>,
) -> Result<Value, EvalFailure> {
    let value = evaluate(operand, env)?;
    match op {
        UnaryOp::Not => match value {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(failure(format!("'!' requires a boolean, found {}", type_name(&other)))),
        },
        UnaryOp::Neg => match value {
            Value::Number(number) => {
                let decimal = decimal_from_number(&number)
                    .ok_or_else(|| failure("'-' operand is not a finite number"))?;
                number_from_decimal(&-decimal)
                    .map(Value::Number)
                    .ok_or_else(|| failure("'-' result is not representable"))
            }
            other => Err(failure(format!("'-' requires a number, found {}", type_name(&other)))),
        },
    }
}

/// Evaluates a binary operation with boolean short-circuiting.
fn evaluate_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    env: &BTreeMap<String, Value>,
) -> Result<Value, EvalFailure> {
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let left_value = as_bool(&evaluate(left, env)?, "boolean connective")?;
        return match (op, left_value) {
            (BinaryOp::And, false) => Ok(Value::Bool(false)),
            (BinaryOp::Or, true) => Ok(Value::Bool(true)),
            _ => {
                let right_value = as_bool(&evaluate(right, env)?, "boolean connective")?;
                Ok(Value::Bool(right_value))
            }
        };
    }

    let left_value = evaluate(left, env)?;
    let right_value = evaluate(right, env)?;
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&left_value, &right_value))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&left_value, &right_value))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare_values(&left_value, &right_value)?;
            let result = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::In => evaluate_in(&left_value, &right_value),
        BinaryOp::Contains => evaluate_contains(&left_value, &right_value),
        BinaryOp::Add => evaluate_add(&left_value, &right_value),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            evaluate_arithmetic(op, &left_value, &right_value)
        }
        BinaryOp::And | BinaryOp::Or => Err(failure("boolean connective handled above")),
    }
}

/// Requires a boolean value for the named operator.
fn as_bool(value: &Value, context: &str) -> Result<bool, EvalFailure> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(failure(format!("{context} requires booleans, found {}", type_name(other)))),
    }
}

// ============================================================================
// SECTION: Equality and Ordering
// ============================================================================

/// Compares JSON values for equality, with decimal-aware numeric handling.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left_num), Value::Number(right_num)) => {
            match (decimal_from_number(left_num), decimal_from_number(right_num)) {
                (Some(left_dec), Some(right_dec)) => left_dec == right_dec,
                _ => left == right,
            }
        }
        _ => left == right,
    }
}

/// Orders two values for comparison operators.
///
/// Numbers order decimal-aware; string pairs order temporally when both parse
/// as RFC3339 timestamps or dates, lexicographically otherwise.
fn compare_values(left: &Value, right: &Value) -> Result<Ordering, EvalFailure> {
    if let (Value::Number(left_num), Value::Number(right_num)) = (left, right) {
        return decimal_cmp(left_num, right_num)
            .ok_or_else(|| failure("numeric comparison on non-finite number"));
    }
    if let (Value::String(left_str), Value::String(right_str)) = (left, right) {
        if let Some(ordering) = temporal_cmp(left_str, right_str) {
            return Ok(ordering);
        }
        return Ok(left_str.cmp(right_str));
    }
    Err(failure(format!(
        "ordering requires two numbers or two strings, found {} and {}",
        type_name(left),
        type_name(right)
    )))
}

/// Compares numbers by parsing them into `BigDecimal` values.
fn decimal_cmp(left: &Number, right: &Number) -> Option<Ordering> {
    let left = decimal_from_number(left)?;
    let right = decimal_from_number(right)?;
    Some(left.cmp(&right))
}

/// Parses a JSON number into `BigDecimal` with a stable string representation.
fn decimal_from_number(number: &Number) -> Option<BigDecimal> {
    let rendered = number.to_string();
    BigDecimal::from_str(&rendered).ok()
}

/// Renders a `BigDecimal` back into a JSON number.
fn number_from_decimal(decimal: &BigDecimal) -> Option<Number> {
    let rendered = decimal.normalized().to_string();
    if let Ok(int) = rendered.parse::<i64>() {
        return Some(Number::from(int));
    }
    if let Ok(uint) = rendered.parse::<u64>() {
        return Some(Number::from(uint));
    }
    rendered.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Compares RFC3339 date-time or date-only strings.
fn temporal_cmp(left: &str, right: &str) -> Option<Ordering> {
    if let (Ok(left), Ok(right)) =
        (OffsetDateTime::parse(left, &Rfc3339), OffsetDateTime::parse(right, &Rfc3339))
    {
        return Some(left.cmp(&right));
    }
    let left = parse_rfc3339_date(left)?;
    let right = parse_rfc3339_date(right)?;
    Some(left.cmp(&right))
}

/// Parses an RFC3339 date-only value (YYYY-MM-DD).
fn parse_rfc3339_date(value: &str) -> Option<Date> {
    let mut parts = value.split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    let day: u8 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let month = time::Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

// ============================================================================
// SECTION: Membership and Containment
// ============================================================================

/// Evaluates `left in right` membership.
fn evaluate_in(left: &Value, right: &Value) -> Result<Value, EvalFailure> {
    match right {
        Value::Array(items) => {
            let found = items.iter().any(|item| values_equal(left, item));
            Ok(Value::Bool(found))
        }
        other => Err(failure(format!("'in' requires a list on the right, found {}", type_name(other)))),
    }
}

/// Evaluates `left contains right` containment.
fn evaluate_contains(left: &Value, right: &Value) -> Result<Value, EvalFailure> {
    match (left, right) {
        (Value::String(haystack), Value::String(needle)) => {
            Ok(Value::Bool(haystack.contains(needle)))
        }
        (Value::Array(items), needle) => {
            let found = items.iter().any(|item| values_equal(item, needle));
            Ok(Value::Bool(found))
        }
        (other, _) => Err(failure(format!(
            "'contains' requires a string or list on the left, found {}",
            type_name(other)
        ))),
    }
}

// ============================================================================
// SECTION: Arithmetic
// ============================================================================

/// Evaluates `+`, which adds numbers or concatenates strings.
fn evaluate_add(left: &Value, right: &Value) -> Result<Value, EvalFailure> {
    match (left, right) {
        (Value::String(left_str), Value::String(right_str)) => {
            let mut out = left_str.clone();
            out.push_str(right_str);
            Ok(Value::String(out))
        }
        _ => evaluate_arithmetic(BinaryOp::Add, left, right),
    }
}

/// Evaluates numeric arithmetic decimal-aware.
fn evaluate_arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalFailure> {
    let (Value::Number(left_num), Value::Number(right_num)) = (left, right) else {
        return Err(failure(format!(
            "arithmetic requires two numbers, found {} and {}",
            type_name(left),
            type_name(right)
        )));
    };
    let left_dec = decimal_from_number(left_num)
        .ok_or_else(|| failure("arithmetic on non-finite number"))?;
    let right_dec = decimal_from_number(right_num)
        .ok_or_else(|| failure("arithmetic on non-finite number"))?;

    let result = match op {
        BinaryOp::Add => left_dec + right_dec,
        BinaryOp::Sub => left_dec - right_dec,
        BinaryOp::Mul => left_dec * right_dec,
        BinaryOp::Div => {
            if right_dec == BigDecimal::from(0) {
                return Err(failure("division by zero"));
            }
            left_dec / right_dec
        }
        BinaryOp::Rem => {
            if right_dec == BigDecimal::from(0) {
                return Err(failure("remainder by zero"));
            }
            left_dec % right_dec
        }
        _ => return Err(failure("non-arithmetic operator")),
    };

    number_from_decimal(&result)
        .map(Value::Number)
        .ok_or_else(|| failure("arithmetic result is not representable"))
}

// ============================================================================
// SECTION: Diagnostics
// ============================================================================

/// Returns a stable type label for error messages.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
