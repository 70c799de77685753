// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod common;

use common::*;
use keel_cel::{CelError, CelEvaluator, ExpressionParams, ParamName};
use keel_drafts_core::{
	Capabilities, DraftAction, DraftState, LockRule, ProtectionState, ResourceKind,
};
use keel_redact::SENTINEL;
use keel_server_drafts::{AddVersionRequest, CreateDraftRequest, DraftError, DraftStore, ErrorKind};
use serde_json::Value;

fn params() -> ExpressionParams {
	ExpressionParams::new()
		.with_string(ParamName::AppName, "test-app")
		.unwrap()
		.with_string(ParamName::CdPipelineName, "test-pipeline")
		.unwrap()
		.with_bool(ParamName::IsProdEnv, true)
		.unwrap()
		.with_int(ParamName::ChartRefId, 15)
		.unwrap()
}

fn admin() -> Capabilities {
	Capabilities {
		can_create: true,
		is_app_admin: true,
		..Default::default()
	}
}

fn replica_lock() -> Vec<LockRule> {
	vec![LockRule {
		expression: "isProdEnv && chartRefId in [15, 16]".to_string(),
		locked_keys: vec!["replicaCount".to_string()],
	}]
}

fn template(payload: &str) -> CreateDraftRequest {
	CreateDraftRequest {
		app_id: APP,
		env_id: ENV,
		kind: ResourceKind::DeploymentTemplate,
		resource_name: "deployment-template".to_string(),
		action: DraftAction::Update,
		payload: payload.to_string(),
		comment: None,
	}
}

#[tokio::test]
async fn secret_payload_is_hidden_from_plain_readers() {
	let h = Harness::new().await;
	h.protect(APP, ENV, ProtectionState::Enabled).await;
	let a = caller(10, creator());
	let created = h
		.service
		.create_draft(
			&a,
			CreateDraftRequest {
				app_id: APP,
				env_id: ENV,
				kind: ResourceKind::Secret,
				resource_name: "db-secret".to_string(),
				action: DraftAction::Add,
				payload: r#"{"password":"hunter2"}"#.to_string(),
				comment: None,
			},
		)
		.await
		.unwrap();
	h.service
		.update_draft_state(&a, created.draft_id, created.version_id, DraftState::AwaitApproval)
		.await
		.unwrap();

	let c = caller(30, creator());
	let view = h.service.get_draft_by_id(&c, created.draft_id).await.unwrap();
	assert!(view.data_redacted);
	let payload: Value = serde_json::from_str(&view.payload).unwrap();
	assert_eq!(payload["password"], SENTINEL);

	let b = caller(20, approver());
	let view = h.service.get_draft_by_id(&b, created.draft_id).await.unwrap();
	assert!(!view.data_redacted);
	assert_eq!(view.payload, r#"{"password":"hunter2"}"#);
	assert!(view.can_approve);

	let admin = caller(
		40,
		Capabilities {
			is_app_admin: true,
			..Default::default()
		},
	);
	let view = h.service.get_draft_by_id(&admin, created.draft_id).await.unwrap();
	assert!(!view.data_redacted);
}

#[test]
fn cel_reference_expressions() {
	let cel = CelEvaluator::new();
	let p = params();
	assert!(cel.evaluate("isProdEnv == true", &p).unwrap());
	assert!(cel
		.evaluate(
			r#"appName.startsWith("test") && cdPipelineName.startsWith("test")"#,
			&p
		)
		.unwrap());
	assert!(cel.evaluate("chartRefId in [15, 16]", &p).unwrap());
	assert!(matches!(
		cel.evaluate("IsProdEnv == (test)", &p),
		Err(CelError::Compile(_))
	));
}

#[tokio::test]
async fn locked_keys_are_reported_when_a_rule_applies() {
	let h = Harness::with_lock_rules(vec![
		LockRule {
			expression: "isProdEnv && chartRefId in [15, 16]".to_string(),
			locked_keys: vec!["replicaCount".to_string(), "resources.limits.cpu".to_string()],
		},
		LockRule {
			expression: r#"appName.startsWith("other")"#.to_string(),
			locked_keys: vec!["image".to_string()],
		},
	])
	.await;
	h.protect(APP, ENV, ProtectionState::Enabled).await;
	let payload = r#"{"replicaCount":3,"image":"app:2","resources":{"limits":{"cpu":"1"}}}"#;
	h.lock_target.set(params(), Some(payload));
	let a = caller(10, creator());
	let created = h.service.create_draft(&a, template(payload)).await.unwrap();

	let live = r#"{"replicaCount":2,"image":"app:1","resources":{"limits":{"cpu":"1"}}}"#;
	let result = h
		.service
		.validate_lock_draft(&a, created.draft_id, &params(), Some(live))
		.await
		.unwrap();
	assert!(result.is_locked);
	assert_eq!(result.locked_keys, vec!["replicaCount".to_string()]);
	assert_eq!(result.applicable_rules, 1);
}

#[tokio::test]
async fn broken_lock_rule_is_a_validation_failure() {
	let h = Harness::with_lock_rules(vec![LockRule {
		expression: "IsProdEnv == (test)".to_string(),
		locked_keys: vec!["replicaCount".to_string()],
	}])
	.await;
	h.protect(APP, ENV, ProtectionState::Enabled).await;
	let a = caller(10, creator());
	let err = h
		.service
		.create_draft(&a, template(r#"{"replicaCount":3}"#))
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::ValidationFailed);

	let created = h
		.service
		.create_draft(&caller(11, admin()), template(r#"{"replicaCount":3}"#))
		.await
		.unwrap();
	let err = h
		.service
		.validate_lock_draft(&a, created.draft_id, &params(), None)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::ValidationFailed);
}

#[tokio::test]
async fn template_changing_locked_keys_is_never_written() {
	let h = Harness::with_lock_rules(replica_lock()).await;
	h.protect(APP, ENV, ProtectionState::Enabled).await;
	h.lock_target
		.set(params(), Some(r#"{"replicaCount":2,"image":"app:1"}"#));
	let a = caller(10, creator());

	let err = h
		.service
		.create_draft(&a, template(r#"{"replicaCount":3,"image":"app:1"}"#))
		.await
		.unwrap_err();
	let DraftError::LockedKeys(validation) = &err else {
		panic!("expected locked keys, got {err:?}");
	};
	assert_eq!(validation.locked_keys, vec!["replicaCount".to_string()]);
	assert_eq!(err.kind(), ErrorKind::ValidationFailed);
	assert_eq!(h.store.count_drafts(APP, &[ENV]).await.unwrap()[&ENV], 0);

	let created = h
		.service
		.create_draft(&a, template(r#"{"replicaCount":2,"image":"app:2"}"#))
		.await
		.unwrap();
	let err = h
		.service
		.add_draft_version(
			&a,
			AddVersionRequest {
				draft_id: created.draft_id,
				last_version_id: created.version_id,
				action: DraftAction::Update,
				payload: Some(r#"{"replicaCount":5,"image":"app:2"}"#.to_string()),
				comment: None,
				change_proposed: false,
			},
		)
		.await
		.unwrap_err();
	assert!(matches!(err, DraftError::LockedKeys(_)));
	assert_eq!(h.store.list_versions(created.draft_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn approval_rechecks_locks_against_the_live_template() {
	let h = Harness::with_lock_rules(replica_lock()).await;
	h.protect(APP, ENV, ProtectionState::Enabled).await;
	h.lock_target.set(params(), Some(r#"{"replicaCount":2}"#));
	let a = caller(10, creator());
	let created = h
		.service
		.create_draft(&a, template(r#"{"replicaCount":2,"image":"app:2"}"#))
		.await
		.unwrap();
	h.service
		.update_draft_state(&a, created.draft_id, created.version_id, DraftState::AwaitApproval)
		.await
		.unwrap();

	h.lock_target.set(params(), Some(r#"{"replicaCount":4}"#));
	let err = h
		.service
		.approve_draft(&caller(20, approver()), created.draft_id, created.version_id)
		.await
		.unwrap_err();
	assert!(matches!(err, DraftError::LockedKeys(_)));
	assert!(h.publisher.applied().is_empty());
	let detail = h.store.get_draft(created.draft_id).await.unwrap().unwrap();
	assert_eq!(detail.draft.state, DraftState::AwaitApproval);
}

#[tokio::test]
async fn locks_skip_admins_and_rules_that_do_not_apply() {
	let h = Harness::with_lock_rules(replica_lock()).await;
	h.protect(APP, ENV, ProtectionState::Enabled).await;
	h.lock_target.set(params(), Some(r#"{"replicaCount":2}"#));

	h.service
		.create_draft(&caller(11, admin()), template(r#"{"replicaCount":9}"#))
		.await
		.unwrap();

	let staging = ExpressionParams::new()
		.with_bool(ParamName::IsProdEnv, false)
		.unwrap()
		.with_int(ParamName::ChartRefId, 15)
		.unwrap();
	h.lock_target.set(staging, Some(r#"{"replicaCount":2}"#));
	let mut other = template(r#"{"replicaCount":9}"#);
	other.resource_name = "other-template".to_string();
	h.service
		.create_draft(&caller(10, creator()), other)
		.await
		.unwrap();
}
