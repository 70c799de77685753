// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Caller and collaborators used by the operator binary.
//!
//! The binary runs with the operator's own authority. It never publishes
//! drafts, so it is wired with a publisher and a lock target source that
//! refuse every request.

use std::sync::Arc;

use async_trait::async_trait;
use keel_drafts_core::{
	AppId, AuthAction, AuthToken, Authorizer, CallerContext, EnvId, ResourceClass, ResourceObject,
	UserId,
};
use keel_server_drafts::{
	LockRuleError, LockTarget, LockTargetSource, PublishError, PublishRequest, Publisher,
};
use tracing::warn;

/// Grants every capability.
pub struct OperatorAuthorizer;

impl Authorizer for OperatorAuthorizer {
	fn can(&self, _class: ResourceClass, _action: AuthAction, _object: ResourceObject) -> bool {
		true
	}
}

pub fn operator_context(user_id: UserId) -> keel_drafts_core::Result<CallerContext> {
	CallerContext::new(user_id, AuthToken::new(""), Arc::new(OperatorAuthorizer))
}

/// A publisher for processes that are not attached to the config services.
pub struct DetachedPublisher;

#[async_trait]
impl Publisher for DetachedPublisher {
	async fn apply(&self, request: &PublishRequest) -> Result<(), PublishError> {
		warn!(
			kind = %request.kind,
			app_id = %request.app_id,
			env_id = %request.env_id,
			"publication requested without an attached config service"
		);
		Err(PublishError::Unavailable("config service".to_string()))
	}
}

/// Live deployment templates are not reachable from the operator binary.
pub struct DetachedLockTargets;

#[async_trait]
impl LockTargetSource for DetachedLockTargets {
	async fn target(
		&self,
		app_id: AppId,
		env_id: EnvId,
		_resource_name: &str,
	) -> Result<LockTarget, LockRuleError> {
		warn!(app_id = %app_id, env_id = %env_id, "lock target requested without a deployment service");
		Err(LockRuleError("deployment service not attached".to_string()))
	}
}
