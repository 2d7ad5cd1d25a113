// crates/grantway-core/examples/minimal.rs
// ============================================================================
// Module: Grantway Minimal Example
// Description: Minimal end-to-end appeal flow using in-memory adapters.
// Purpose: Demonstrate init/advance/action/grant against a two-step policy.
// Dependencies: grantway-core
// ============================================================================

//! ## Overview
//! Walks one appeal through a two-step policy (an automatic owner check and a
//! manual lead sign-off), then converts the approved appeal into a grant and
//! hands it to an in-memory provider. This example is backend-agnostic and
//! suitable for quick verification.

use std::collections::BTreeMap;
use std::sync::Mutex;

use grantway_core::AccessProvider;
use grantway_core::Appeal;
use grantway_core::AppealAction;
use grantway_core::AppealId;
use grantway_core::AppealOptions;
use grantway_core::AppealStatus;
use grantway_core::ApprovalAction;
use grantway_core::Expression;
use grantway_core::Grant;
use grantway_core::Notification;
use grantway_core::NotificationKind;
use grantway_core::Notifier;
use grantway_core::NotifyError;
use grantway_core::Policy;
use grantway_core::PolicyId;
use grantway_core::PolicyStore;
use grantway_core::PolicyStoreError;
use grantway_core::PolicyVersion;
use grantway_core::ProviderError;
use grantway_core::Resource;
use grantway_core::ResourceId;
use grantway_core::Step;
use grantway_core::StepStrategy;
use serde_json::json;
use time::OffsetDateTime;

/// Error type for example preconditions.
#[derive(Debug)]
struct ExampleError(&'static str);

impl std::fmt::Display for ExampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ExampleError {}

/// Provider that records granted access in memory.
#[derive(Default)]
struct InMemoryProvider {
    /// Granted records keyed by account id.
    grants: Mutex<BTreeMap<String, Grant>>,
}

impl AccessProvider for InMemoryProvider {
    fn grant_access(&self, grant: &Grant) -> Result<(), ProviderError> {
        let mut guard = self
            .grants
            .lock()
            .map_err(|_| ProviderError::Provider("grant store mutex poisoned".to_string()))?;
        guard.insert(grant.account_id.clone(), grant.clone());
        Ok(())
    }

    fn revoke_access(&self, grant: &Grant) -> Result<(), ProviderError> {
        let mut guard = self
            .grants
            .lock()
            .map_err(|_| ProviderError::Provider("grant store mutex poisoned".to_string()))?;
        guard.remove(&grant.account_id);
        Ok(())
    }
}

/// Policy store backed by an in-memory map.
#[derive(Default)]
struct InMemoryPolicyStore {
    /// Stored policies keyed by (id, version).
    policies: Mutex<BTreeMap<(PolicyId, u64), Policy>>,
}

impl InMemoryPolicyStore {
    /// Stores a policy version.
    fn put(&self, policy: Policy) -> Result<(), PolicyStoreError> {
        let mut guard = self
            .policies
            .lock()
            .map_err(|_| PolicyStoreError::Io("policy store mutex poisoned".to_string()))?;
        guard.insert((policy.id.clone(), policy.version.get()), policy);
        Ok(())
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn get(
        &self,
        id: &PolicyId,
        version: PolicyVersion,
    ) -> Result<Option<Policy>, PolicyStoreError> {
        let guard = self
            .policies
            .lock()
            .map_err(|_| PolicyStoreError::Io("policy store mutex poisoned".to_string()))?;
        Ok(guard.get(&(id.clone(), version.get())).cloned())
    }
}

/// Notifier that collects outbound notifications in memory.
#[derive(Default)]
struct CollectingNotifier {
    /// Delivered notifications.
    sent: Mutex<Vec<Notification>>,
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notifications: &[Notification]) -> Result<(), NotifyError> {
        let mut guard = self
            .sent
            .lock()
            .map_err(|_| NotifyError::Delivery("notifier mutex poisoned".to_string()))?;
        guard.extend_from_slice(notifications);
        Ok(())
    }
}

/// Builds the two-step policy for the example run.
fn build_policy() -> Result<Policy, ExampleError> {
    let version =
        PolicyVersion::from_raw(1).ok_or(ExampleError("policy version must be nonzero"))?;
    Ok(Policy {
        id: PolicyId::new("warehouse-access"),
        version,
        description: "Warehouse access approval".to_string(),
        steps: vec![
            Step {
                name: "owner-check".to_string(),
                description: "Auto-approve when the requester owns the dataset".to_string(),
                strategy: StepStrategy::Auto,
                when: None,
                approve_if: Some(Expression::new(
                    r#"$appeal.resource.details.owner == $appeal.created_by"#,
                )),
                rejection_reason: Some("requester does not own the dataset".to_string()),
                allow_failed: false,
                dependencies: None,
                approvers: Vec::new(),
            },
            Step {
                name: "lead-signoff".to_string(),
                description: "Data lead confirms the access window".to_string(),
                strategy: StepStrategy::Manual,
                when: None,
                approve_if: None,
                rejection_reason: None,
                allow_failed: false,
                dependencies: None,
                approvers: vec!["lead@example.com".to_string()],
            },
        ],
        requirements: Vec::new(),
        labels: BTreeMap::new(),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryPolicyStore::default();
    store.put(build_policy()?)?;
    let policy = store
        .get(&PolicyId::new("warehouse-access"), PolicyVersion::from_raw(1).ok_or(
            ExampleError("policy version must be nonzero"),
        )?)?
        .ok_or(ExampleError("policy missing from store"))?;

    let mut details = serde_json::Map::new();
    details.insert("owner".to_string(), json!("analyst@example.com"));

    let mut appeal = Appeal {
        id: AppealId::new("appeal-1"),
        account_id: "analyst@example.com".to_string(),
        resource_id: ResourceId::new("dataset-1"),
        resource: Some(Resource {
            id: ResourceId::new("dataset-1"),
            provider_type: "warehouse".to_string(),
            name: "orders".to_string(),
            details,
            ..Resource::default()
        }),
        role: "viewer".to_string(),
        created_by: "analyst@example.com".to_string(),
        options: Some(AppealOptions {
            duration: "1h".to_string(),
        }),
        ..Appeal::default()
    };
    appeal.set_defaults();
    appeal.init(&policy)?;
    appeal.advance_approval(&policy)?;

    // The auto step resolved; the manual step now awaits the data lead.
    let pending =
        appeal.next_pending_approval().ok_or(ExampleError("expected a pending approval"))?;

    let notifier = CollectingNotifier::default();
    let notifications: Vec<Notification> = pending
        .approvers
        .iter()
        .map(|approver| Notification {
            user: approver.clone(),
            kind: NotificationKind::ApproverNotification,
            appeal_id: appeal.id.clone(),
            resource_name: "orders".to_string(),
            role: appeal.role.clone(),
            requestor: appeal.created_by.clone(),
        })
        .collect();
    notifier.notify(&notifications)?;

    let action = ApprovalAction {
        appeal_id: appeal.id.clone(),
        approval_name: pending.name.clone(),
        actor: "lead@example.com".to_string(),
        action: AppealAction::Approve,
        reason: None,
    };
    appeal.apply_action(&action, &policy)?;

    if appeal.status != AppealStatus::Approved {
        return Err(ExampleError("appeal did not reach approved status").into());
    }

    let grant = appeal.to_grant(OffsetDateTime::now_utc())?;
    let provider = InMemoryProvider::default();
    provider.grant_access(&grant)?;
    Ok(())
}
