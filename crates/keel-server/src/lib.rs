// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wiring for the drafts subsystem.
//!
//! [`DraftsRuntime::build`] is the single place where the store, protection
//! registry, listener bus, CEL evaluator and draft service are put together.
//! Collaborators owned by other subsystems (the publisher, the lock rule
//! source and the lock target source) are passed in.

pub mod operator;
pub mod params;

use std::sync::Arc;
use std::time::Duration;

use keel_cel::{CelEvaluator, ParamSchema};
use keel_drafts_core::UserId;
use keel_redact::Redactor;
use keel_server_config::ServerConfig;
use keel_server_drafts::{
	ConfigValidator, DraftDiscardListener, DraftService, DraftStore, ListenerBus, LockRuleSource,
	LockTargetSource, LockValidator, ProtectionRegistry, Publisher, SqliteDraftStore,
	SqliteProtectionRepository,
};
use sqlx::SqlitePool;
use tracing::info;

/// External collaborators of the drafts subsystem.
pub struct Collaborators {
	pub publisher: Arc<dyn Publisher>,
	pub validator: Arc<dyn ConfigValidator>,
	pub lock_rules: Arc<dyn LockRuleSource>,
	pub lock_targets: Arc<dyn LockTargetSource>,
}

pub struct DraftsRuntime {
	pub store: Arc<dyn DraftStore>,
	pub registry: Arc<ProtectionRegistry>,
	pub locks: Arc<LockValidator>,
	pub cel: Arc<CelEvaluator>,
	pub service: Arc<DraftService>,
}

impl DraftsRuntime {
	/// Builds the subsystem on an already migrated pool.
	pub fn build(config: &ServerConfig, pool: SqlitePool, collaborators: Collaborators) -> Self {
		let timeout = Duration::from_secs(config.drafts.operation_timeout_secs);
		let store: Arc<dyn DraftStore> = Arc::new(SqliteDraftStore::new(pool.clone()));

		let bus = Arc::new(ListenerBus::new());
		bus.subscribe(Arc::new(DraftDiscardListener::new(
			Arc::clone(&store),
			UserId(config.drafts.system_user_id),
		)));
		let registry = Arc::new(ProtectionRegistry::new(
			Arc::new(SqliteProtectionRepository::new(pool)),
			bus,
			timeout,
		));

		let cel = Arc::new(CelEvaluator::with_capacity(config.cel.cache_capacity));
		let locks = Arc::new(LockValidator::new(
			collaborators.lock_rules,
			collaborators.lock_targets,
			Arc::clone(&cel),
		));

		let service = Arc::new(DraftService::new(
			Arc::clone(&store),
			Arc::clone(&registry),
			collaborators.publisher,
			collaborators.validator,
			Arc::clone(&locks),
			Redactor::new(config.drafts.redaction_sentinel.clone()),
			timeout,
		));

		info!(
			timeout_secs = config.drafts.operation_timeout_secs,
			cel_cache = config.cel.cache_capacity,
			"drafts runtime ready"
		);
		Self {
			store,
			registry,
			locks,
			cel,
			service,
		}
	}

	/// Compiles every lock rule against `schema`, failing on the first broken one.
	pub async fn precompile_lock_rules(&self, schema: &ParamSchema) -> keel_server_drafts::Result<usize> {
		self.locks.precompile(schema).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use keel_drafts_core::{AppId, DraftState, EnvId, LockRule, ProtectionState};
	use keel_server_db::testing::create_test_pool;
	use keel_server_drafts::{CreateDraftRequest, JsonPayloadValidator, StaticLockRules};

	fn collaborators(rules: Vec<LockRule>) -> Collaborators {
		Collaborators {
			publisher: Arc::new(operator::DetachedPublisher),
			validator: Arc::new(JsonPayloadValidator),
			lock_rules: Arc::new(StaticLockRules(rules)),
			lock_targets: Arc::new(operator::DetachedLockTargets),
		}
	}

	#[tokio::test]
	async fn toggle_discards_through_wired_listener() {
		let mut config = ServerConfig::default();
		config.drafts.system_user_id = 99;
		let runtime = DraftsRuntime::build(&config, create_test_pool().await, collaborators(Vec::new()));
		let (app, env) = (AppId(1), EnvId(2));

		runtime
			.registry
			.set_protection(app, env, ProtectionState::Enabled, UserId(5), None)
			.await
			.unwrap();
		let caller = operator::operator_context(UserId(5)).unwrap();
		let created = runtime
			.service
			.create_draft(
				&caller,
				CreateDraftRequest {
					app_id: app,
					env_id: env,
					kind: keel_drafts_core::ResourceKind::ConfigMap,
					resource_name: "cm1".to_string(),
					action: keel_drafts_core::DraftAction::Add,
					payload: r#"{"k":"v"}"#.to_string(),
					comment: None,
				},
			)
			.await
			.unwrap();

		runtime
			.registry
			.set_protection(app, env, ProtectionState::Disabled, UserId(5), None)
			.await
			.unwrap();
		let detail = runtime
			.store
			.get_draft(created.draft_id)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(detail.draft.state, DraftState::Discarded);
		assert_eq!(detail.draft.updated_by, UserId(99));
	}

	#[tokio::test]
	async fn broken_lock_rules_fail_precompilation() {
		let runtime = DraftsRuntime::build(
			&ServerConfig::default(),
			create_test_pool().await,
			collaborators(vec![LockRule {
				expression: "isProdEnv ==".to_string(),
				locked_keys: vec!["replicaCount".to_string()],
			}]),
		);
		let schema = params::default_schema();
		assert!(runtime.precompile_lock_rules(&schema).await.is_err());
	}
}
