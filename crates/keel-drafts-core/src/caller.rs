// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Caller identity and capability decisions.
//!
//! The drafts core never inspects credentials. The HTTP layer authenticates the
//! request and hands over a [`CallerContext`]: the user id, the opaque token
//! (kept only so it can be forwarded) and an [`Authorizer`] that answers
//! capability questions for a given (app, env).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use zeroize::Zeroize;

use crate::error::{CoreError, Result};
use crate::ids::{AppId, EnvId, UserId};

const REDACTED: &str = "[REDACTED]";

/// Opaque bearer token of the caller.
///
/// Formatting never shows the value and the memory is zeroed on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct AuthToken(String);

impl AuthToken {
	pub fn new(token: impl Into<String>) -> Self {
		Self(token.into())
	}

	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for AuthToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("AuthToken").field(&REDACTED).finish()
	}
}

impl fmt::Display for AuthToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
	/// Configuration objects: ConfigMaps, Secrets, deployment templates.
	Config,
	/// The approval queue of protected configuration.
	ConfigApproval,
	Application,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthAction {
	Create,
	Update,
	Delete,
	Approve,
	Admin,
}

/// The object a capability question is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceObject {
	pub app_id: AppId,
	pub env_id: EnvId,
}

/// Capability decision callback supplied by the auth layer.
pub trait Authorizer: Send + Sync {
	fn can(&self, class: ResourceClass, action: AuthAction, object: ResourceObject) -> bool;
}

/// Resolved capabilities of a caller for one (app, env).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
	pub can_create: bool,
	pub can_update: bool,
	pub can_delete: bool,
	pub can_approve: bool,
	pub is_app_admin: bool,
}

impl Capabilities {
	/// Asks the authorizer every question the policy needs, always scoped to
	/// (app, env) so environment-level rules can be applied outside the core.
	pub fn resolve(authorizer: &dyn Authorizer, app_id: AppId, env_id: EnvId) -> Self {
		let object = ResourceObject { app_id, env_id };
		Self {
			can_create: authorizer.can(ResourceClass::Config, AuthAction::Create, object),
			can_update: authorizer.can(ResourceClass::Config, AuthAction::Update, object),
			can_delete: authorizer.can(ResourceClass::Config, AuthAction::Delete, object),
			can_approve: authorizer.can(ResourceClass::ConfigApproval, AuthAction::Approve, object),
			is_app_admin: authorizer.can(ResourceClass::Application, AuthAction::Admin, object),
		}
	}
}

#[derive(Clone)]
pub struct CallerContext {
	user_id: UserId,
	token: AuthToken,
	authorizer: Arc<dyn Authorizer>,
	deadline: Option<Instant>,
}

impl CallerContext {
	pub fn new(user_id: UserId, token: AuthToken, authorizer: Arc<dyn Authorizer>) -> Result<Self> {
		if user_id.0 <= 0 {
			return Err(CoreError::InvalidUserId(user_id.0));
		}
		Ok(Self {
			user_id,
			token,
			authorizer,
			deadline: None,
		})
	}

	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(deadline);
		self
	}

	pub fn user_id(&self) -> UserId {
		self.user_id
	}

	pub fn token(&self) -> &AuthToken {
		&self.token
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	pub fn capabilities(&self, app_id: AppId, env_id: EnvId) -> Capabilities {
		Capabilities::resolve(self.authorizer.as_ref(), app_id, env_id)
	}
}

impl fmt::Debug for CallerContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CallerContext")
			.field("user_id", &self.user_id)
			.field("token", &self.token)
			.field("deadline", &self.deadline)
			.finish_non_exhaustive()
	}
}
