// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use keel_cel::{CelEvaluator, ExpressionParams};
use keel_drafts_core::{
	AppId, AuthAction, AuthToken, Authorizer, CallerContext, Capabilities, DraftAction, EnvId,
	LockRule, ProtectionState, ResourceClass, ResourceKind, ResourceObject, UserId,
};
use keel_redact::Redactor;
use keel_server_db::testing::create_test_pool;
use keel_server_drafts::{
	CreateDraftRequest, DraftDiscardListener, DraftService, DraftStore, JsonPayloadValidator,
	ListenerBus, LockRuleError, LockTarget, LockTargetSource, LockValidator, ProtectionRegistry,
	PublishError, PublishRequest, Publisher, SqliteDraftStore, SqliteProtectionRepository,
	StaticLockRules,
};

pub const APP: AppId = AppId(42);
pub const ENV: EnvId = EnvId(7);
pub const SYSTEM_USER: UserId = UserId(1);

/// Grants a fixed set of capabilities regardless of the object asked about.
pub struct FixedGrants(pub Capabilities);

impl Authorizer for FixedGrants {
	fn can(&self, class: ResourceClass, action: AuthAction, _object: ResourceObject) -> bool {
		match (class, action) {
			(ResourceClass::Config, AuthAction::Create) => self.0.can_create,
			(ResourceClass::Config, AuthAction::Update) => self.0.can_update,
			(ResourceClass::Config, AuthAction::Delete) => self.0.can_delete,
			(ResourceClass::ConfigApproval, AuthAction::Approve) => self.0.can_approve,
			(ResourceClass::Application, AuthAction::Admin) => self.0.is_app_admin,
			_ => false,
		}
	}
}

pub fn caller(user: i32, caps: Capabilities) -> CallerContext {
	CallerContext::new(UserId(user), AuthToken::new(format!("token-{user}")), Arc::new(FixedGrants(caps)))
		.unwrap()
}

pub fn creator() -> Capabilities {
	Capabilities {
		can_create: true,
		..Default::default()
	}
}

pub fn approver() -> Capabilities {
	Capabilities {
		can_approve: true,
		..Default::default()
	}
}

/// Records every publication and can be switched to fail or stall.
#[derive(Default)]
pub struct RecordingPublisher {
	pub applied: Mutex<Vec<PublishRequest>>,
	fail: AtomicBool,
	stall: AtomicBool,
	finish_at: Mutex<Option<Instant>>,
}

impl RecordingPublisher {
	pub fn fail_next(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}

	pub fn stall(&self, stall: bool) {
		self.stall.store(stall, Ordering::SeqCst);
	}

	/// Makes the next apply block the thread until `at` and then succeed.
	/// Nothing can interrupt it, so it always completes.
	pub fn finish_at(&self, at: Instant) {
		*self.finish_at.lock().unwrap() = Some(at);
	}

	pub fn applied(&self) -> Vec<PublishRequest> {
		self.applied.lock().unwrap().clone()
	}
}

#[async_trait]
impl Publisher for RecordingPublisher {
	async fn apply(&self, request: &PublishRequest) -> Result<(), PublishError> {
		if self.stall.load(Ordering::SeqCst) {
			tokio::time::sleep(Duration::from_secs(30)).await;
		}
		if self.fail.load(Ordering::SeqCst) {
			return Err(PublishError::Unavailable("configmap service".to_string()));
		}
		if let Some(at) = self.finish_at.lock().unwrap().take() {
			std::thread::sleep(at.saturating_duration_since(Instant::now()));
		}
		self.applied.lock().unwrap().push(request.clone());
		Ok(())
	}
}

/// Serves one lock target for every template; tests swap it as they go.
#[derive(Default)]
pub struct SwappableLockTarget(Mutex<LockTarget>);

impl SwappableLockTarget {
	pub fn set(&self, params: ExpressionParams, live_payload: Option<&str>) {
		*self.0.lock().unwrap() = LockTarget {
			params,
			live_payload: live_payload.map(str::to_string),
		};
	}
}

#[async_trait]
impl LockTargetSource for SwappableLockTarget {
	async fn target(
		&self,
		_app_id: AppId,
		_env_id: EnvId,
		_resource_name: &str,
	) -> Result<LockTarget, LockRuleError> {
		Ok(self.0.lock().unwrap().clone())
	}
}

pub struct Harness {
	pub store: Arc<SqliteDraftStore>,
	pub registry: Arc<ProtectionRegistry>,
	pub publisher: Arc<RecordingPublisher>,
	pub lock_target: Arc<SwappableLockTarget>,
	pub service: DraftService,
}

impl Harness {
	pub async fn new() -> Self {
		Self::with_lock_rules(Vec::new()).await
	}

	pub async fn with_lock_rules(rules: Vec<LockRule>) -> Self {
		let pool = create_test_pool().await;
		let store = Arc::new(SqliteDraftStore::new(pool.clone()));

		let bus = Arc::new(ListenerBus::new());
		bus.subscribe(Arc::new(DraftDiscardListener::new(
			store.clone() as Arc<dyn DraftStore>,
			SYSTEM_USER,
		)));
		let registry = Arc::new(ProtectionRegistry::new(
			Arc::new(SqliteProtectionRepository::new(pool)),
			bus,
			Duration::from_secs(5),
		));

		let publisher = Arc::new(RecordingPublisher::default());
		let lock_target = Arc::new(SwappableLockTarget::default());
		let locks = Arc::new(LockValidator::new(
			Arc::new(StaticLockRules(rules)),
			lock_target.clone(),
			Arc::new(CelEvaluator::new()),
		));
		let service = DraftService::new(
			store.clone(),
			registry.clone(),
			publisher.clone(),
			Arc::new(JsonPayloadValidator),
			locks,
			Redactor::default(),
			Duration::from_secs(5),
		);

		Self {
			store,
			registry,
			publisher,
			lock_target,
			service,
		}
	}

	pub async fn protect(&self, app: AppId, env: EnvId, state: ProtectionState) {
		self.registry
			.set_protection(app, env, state, SYSTEM_USER, None)
			.await
			.unwrap();
	}
}

pub fn config_map(name: &str, payload: &str) -> CreateDraftRequest {
	CreateDraftRequest {
		app_id: APP,
		env_id: ENV,
		kind: ResourceKind::ConfigMap,
		resource_name: name.to_string(),
		action: DraftAction::Add,
		payload: payload.to_string(),
		comment: None,
	}
}
