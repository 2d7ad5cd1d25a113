// crates/grantway-config/src/lib.rs
// ============================================================================
// Module: Grantway Policy Config
// Description: Policy document loading and structural validation.
// Purpose: Ensure only well-formed policies reach the approval engine.
// Dependencies: grantway-core, serde, serde_json, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! Policy documents are authored as YAML or JSON files. Loading is strict and
//! fail-closed: path and size guards run before any parsing, the parser is
//! selected by file extension, and every structural rule failure is a
//! distinct [`PolicyConfigError`] variant. A [`PolicyConfig`] therefore
//! witnesses a document the engine can trust: step names are unique,
//! strategy-conditional fields are present, dependencies reference strictly
//! earlier steps, literal approver emails are well-formed, and every
//! expression compiles.
//!
//! Security posture: policy files are author-controlled input and treated as
//! untrusted until validation completes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use grantway_core::ExprError;
use grantway_core::Expression;
use grantway_core::Policy;
use grantway_core::Step;
use grantway_core::StepStrategy;
use grantway_core::runtime::is_valid_email;
use thiserror::Error;

// ============================================================================
// SECTION: Input Limits
// ============================================================================

/// Maximum accepted policy file path length in bytes.
pub const MAX_PATH_LENGTH: usize = 4_096;

/// Maximum accepted path component length in bytes.
pub const MAX_PATH_COMPONENT_LENGTH: usize = 255;

/// Maximum accepted policy file size in bytes (1 MiB).
pub const MAX_FILE_SIZE: u64 = 1_048_576;

// ============================================================================
// SECTION: Config Errors
// ============================================================================

/// Errors raised while loading or validating a policy document.
///
/// # Invariants
/// - Variants are stable so callers and tests branch on identity.
#[derive(Debug, Error)]
pub enum PolicyConfigError {
    /// The policy file path exceeds the accepted length.
    #[error("policy path exceeds max length ({length} > {max})")]
    PathTooLong {
        /// Offending path length in bytes.
        length: usize,
        /// Maximum accepted length.
        max: usize,
    },
    /// A path component exceeds the accepted length.
    #[error("policy path component too long: {component:?}")]
    PathComponentTooLong {
        /// Offending component text.
        component: String,
    },
    /// The policy file exceeds the accepted size.
    #[error("policy file exceeds size limit ({size} > {max})")]
    FileTooLarge {
        /// Actual file size in bytes.
        size: u64,
        /// Maximum accepted size.
        max: u64,
    },
    /// The policy file is not valid UTF-8.
    #[error("policy file is not valid utf-8")]
    NotUtf8,
    /// The policy file extension selects no parser.
    #[error("unsupported policy file extension {extension:?} (expected yaml, yml, or json)")]
    UnsupportedExtension {
        /// Offending extension text.
        extension: String,
    },
    /// Reading the policy file failed.
    #[error("reading policy file: {0}")]
    Io(String),
    /// The policy document failed to parse.
    #[error("parsing policy document: {0}")]
    Parse(String),
    /// The policy identifier is empty.
    #[error("policy id is required")]
    EmptyPolicyId,
    /// A step has an empty name.
    #[error("step {index} has an empty name")]
    EmptyStepName {
        /// Zero-based step index.
        index: usize,
    },
    /// Two steps share a name.
    #[error("duplicate step name {name:?}")]
    DuplicateStepName {
        /// Duplicated step name.
        name: String,
    },
    /// An auto step has no `approve_if` expression.
    #[error("auto step {step:?} requires an approve_if expression")]
    MissingApproveIf {
        /// Step name.
        step: String,
    },
    /// A manual step declares an `approve_if` expression.
    #[error("manual step {step:?} must not declare approve_if")]
    UnexpectedApproveIf {
        /// Step name.
        step: String,
    },
    /// A manual step has no approvers.
    #[error("manual step {step:?} requires at least one approver")]
    MissingApprovers {
        /// Step name.
        step: String,
    },
    /// An auto step declares approvers.
    #[error("auto step {step:?} must not declare approvers")]
    UnexpectedApprovers {
        /// Step name.
        step: String,
    },
    /// An auto-only flag is set on a manual step.
    #[error("manual step {step:?} must not set allow_failed")]
    UnexpectedAllowFailed {
        /// Step name.
        step: String,
    },
    /// A literal approver entry is not a valid email.
    #[error("step {step:?} approver {value:?} is not a valid email")]
    InvalidApproverEmail {
        /// Step name.
        step: String,
        /// Offending approver entry.
        value: String,
    },
    /// A dependency names a step that does not exist.
    #[error("step {step:?} depends on unknown step {dependency:?}")]
    UnknownDependency {
        /// Step name.
        step: String,
        /// Unknown dependency name.
        dependency: String,
    },
    /// A dependency names the step itself or a later step.
    #[error("step {step:?} depends on non-earlier step {dependency:?}")]
    ForwardDependency {
        /// Step name.
        step: String,
        /// Offending dependency name.
        dependency: String,
    },
    /// A step expression failed to compile.
    #[error("step {step:?}: {source}")]
    InvalidExpression {
        /// Step name.
        step: String,
        /// Underlying compile failure.
        #[source]
        source: ExprError,
    },
    /// A requirement condition field is not a supported dot path.
    #[error("requirement {index} condition field {field:?} must be rooted at $resource.")]
    InvalidConditionField {
        /// Zero-based requirement index.
        index: usize,
        /// Offending field text.
        field: String,
    },
    /// A requirement trigger expression failed to compile.
    #[error("requirement {index}: {source}")]
    InvalidRequirementExpression {
        /// Zero-based requirement index.
        index: usize,
        /// Underlying compile failure.
        #[source]
        source: ExprError,
    },
}

// ============================================================================
// SECTION: Policy Config
// ============================================================================

/// A policy document that passed loading guards and structural validation.
///
/// # Invariants
/// - The wrapped policy satisfies every rule in [`validate_policy`].
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Validated policy document.
    policy: Policy,
}

impl PolicyConfig {
    /// Loads and validates a policy document from a file.
    ///
    /// The parser is selected by extension: `.yaml`/`.yml` or `.json`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyConfigError`] when a guard, parse, or validation rule
    /// fails; nothing is partially accepted.
    pub fn load(path: &Path) -> Result<Self, PolicyConfigError> {
        check_path(path)?;

        let metadata = fs::metadata(path).map_err(|err| PolicyConfigError::Io(err.to_string()))?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(PolicyConfigError::FileTooLarge {
                size: metadata.len(),
                max: MAX_FILE_SIZE,
            });
        }

        let bytes = fs::read(path).map_err(|err| PolicyConfigError::Io(err.to_string()))?;
        let text = String::from_utf8(bytes).map_err(|_| PolicyConfigError::NotUtf8)?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
        let policy: Policy = match extension {
            "yaml" | "yml" => serde_yaml::from_str(&text)
                .map_err(|err| PolicyConfigError::Parse(err.to_string()))?,
            "json" => serde_json::from_str(&text)
                .map_err(|err| PolicyConfigError::Parse(err.to_string()))?,
            other => {
                return Err(PolicyConfigError::UnsupportedExtension {
                    extension: other.to_string(),
                });
            }
        };

        Self::from_policy(policy)
    }

    /// Validates an already-parsed policy document.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyConfigError`] when a structural rule fails.
    pub fn from_policy(policy: Policy) -> Result<Self, PolicyConfigError> {
        validate_policy(&policy)?;
        Ok(Self {
            policy,
        })
    }

    /// Returns the validated policy.
    #[must_use]
    pub const fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Consumes the config, returning the validated policy.
    #[must_use]
    pub fn into_policy(self) -> Policy {
        self.policy
    }
}

// ============================================================================
// SECTION: Path Guards
// ============================================================================

/// Applies path length guards before touching the filesystem.
fn check_path(path: &Path) -> Result<(), PolicyConfigError> {
    let rendered = path.to_string_lossy();
    if rendered.len() > MAX_PATH_LENGTH {
        return Err(PolicyConfigError::PathTooLong {
            length: rendered.len(),
            max: MAX_PATH_LENGTH,
        });
    }
    for component in path.components() {
        let component = component.as_os_str().to_string_lossy();
        if component.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(PolicyConfigError::PathComponentTooLong {
                component: component.into_owned(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Structural Validation
// ============================================================================

/// Validates a policy document's structural rules.
///
/// Rules: non-empty policy id; non-empty, unique step names; auto steps carry
/// `approve_if` and nothing manual-only; manual steps carry approvers and
/// nothing auto-only; literal approver entries are valid emails and `$`
/// entries compile; dependencies reference strictly earlier steps; every
/// step and requirement expression compiles; requirement condition fields are
/// `$resource.`-rooted.
///
/// # Errors
///
/// Returns the first [`PolicyConfigError`] encountered, in declaration order.
pub fn validate_policy(policy: &Policy) -> Result<(), PolicyConfigError> {
    if policy.id.as_str().is_empty() {
        return Err(PolicyConfigError::EmptyPolicyId);
    }

    let all_names: Vec<&str> = policy.steps.iter().map(|step| step.name.as_str()).collect();
    let mut seen_names: Vec<&str> = Vec::with_capacity(policy.steps.len());
    for (index, step) in policy.steps.iter().enumerate() {
        if step.name.is_empty() {
            return Err(PolicyConfigError::EmptyStepName {
                index,
            });
        }
        if seen_names.contains(&step.name.as_str()) {
            return Err(PolicyConfigError::DuplicateStepName {
                name: step.name.clone(),
            });
        }

        validate_strategy_fields(step)?;
        validate_approver_entries(step)?;
        validate_dependencies(step, &seen_names, &all_names)?;
        validate_step_expressions(step)?;

        seen_names.push(step.name.as_str());
    }

    for (index, requirement) in policy.requirements.iter().enumerate() {
        for condition in &requirement.on.conditions {
            if !condition.field.starts_with("$resource.") {
                return Err(PolicyConfigError::InvalidConditionField {
                    index,
                    field: condition.field.clone(),
                });
            }
        }
        if let Some(expression) = &requirement.on.expression {
            expression.check().map_err(|source| {
                PolicyConfigError::InvalidRequirementExpression {
                    index,
                    source,
                }
            })?;
        }
    }

    Ok(())
}

/// Checks strategy-conditional required and forbidden fields.
fn validate_strategy_fields(
    step: &Step,
) -> Result<(), PolicyConfigError> {
    match step.strategy {
        StepStrategy::Auto => {
            if step.approve_if.is_none() {
                return Err(PolicyConfigError::MissingApproveIf {
                    step: step.name.clone(),
                });
            }
            if !step.approvers.is_empty() {
                return Err(PolicyConfigError::UnexpectedApprovers {
                    step: step.name.clone(),
                });
            }
        }
        StepStrategy::Manual => {
            if step.approve_if.is_some() {
                return Err(PolicyConfigError::UnexpectedApproveIf {
                    step: step.name.clone(),
                });
            }
            if step.approvers.is_empty() {
                return Err(PolicyConfigError::MissingApprovers {
                    step: step.name.clone(),
                });
            }
            if step.allow_failed {
                return Err(PolicyConfigError::UnexpectedAllowFailed {
                    step: step.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Checks approver entries: literal emails validate, `$` entries compile.
fn validate_approver_entries(
    step: &Step,
) -> Result<(), PolicyConfigError> {
    for entry in &step.approvers {
        if entry.starts_with('$') {
            Expression::new(entry.clone()).check().map_err(|source| {
                PolicyConfigError::InvalidExpression {
                    step: step.name.clone(),
                    source,
                }
            })?;
        } else if !is_valid_email(entry) {
            return Err(PolicyConfigError::InvalidApproverEmail {
                step: step.name.clone(),
                value: entry.clone(),
            });
        }
    }
    Ok(())
}

/// Checks that dependencies reference strictly earlier declared steps.
fn validate_dependencies(
    step: &Step,
    earlier_names: &[&str],
    all_names: &[&str],
) -> Result<(), PolicyConfigError> {
    let Some(dependencies) = &step.dependencies else {
        return Ok(());
    };
    for dependency in dependencies {
        if earlier_names.contains(&dependency.as_str()) {
            continue;
        }
        if all_names.contains(&dependency.as_str()) {
            return Err(PolicyConfigError::ForwardDependency {
                step: step.name.clone(),
                dependency: dependency.clone(),
            });
        }
        return Err(PolicyConfigError::UnknownDependency {
            step: step.name.clone(),
            dependency: dependency.clone(),
        });
    }
    Ok(())
}

/// Checks that `when` and `approve_if` expressions compile.
fn validate_step_expressions(
    step: &Step,
) -> Result<(), PolicyConfigError> {
    if let Some(when) = &step.when {
        when.check().map_err(|source| PolicyConfigError::InvalidExpression {
            step: step.name.clone(),
            source,
        })?;
    }
    if let Some(approve_if) = &step.approve_if {
        approve_if.check().map_err(|source| PolicyConfigError::InvalidExpression {
            step: step.name.clone(),
            source,
        })?;
    }
    Ok(())
}
