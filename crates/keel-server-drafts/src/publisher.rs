// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Applying an approved draft to the live configuration.

use std::sync::Arc;

use async_trait::async_trait;
use keel_drafts_core::{AppId, DraftAction, EnvId, ResourceKind, UserId};
use serde::Serialize;
use tracing::{debug, instrument};

/// Everything a config service needs to apply one draft version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishRequest {
	pub kind: ResourceKind,
	pub app_id: AppId,
	pub env_id: EnvId,
	pub resource_name: String,
	pub action: DraftAction,
	pub payload: String,
	pub user_id: UserId,
}

impl PublishRequest {
	pub fn scope(&self) -> ConfigScope {
		if self.env_id.is_base() {
			ConfigScope::Base
		} else {
			ConfigScope::Environment(self.env_id)
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
	#[error("{0}")]
	Rejected(String),

	#[error("{0} is unavailable")]
	Unavailable(String),
}

/// Applies a draft. Either the whole change lands or nothing does.
#[async_trait]
pub trait Publisher: Send + Sync {
	async fn apply(&self, request: &PublishRequest) -> Result<(), PublishError>;
}

/// Whether a change targets the application's base configuration or an
/// environment override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
	Base,
	Environment(EnvId),
}

/// One config service: ConfigMaps, Secrets or deployment templates.
#[async_trait]
pub trait ConfigApplier: Send + Sync {
	fn name(&self) -> &str;

	async fn apply(&self, scope: ConfigScope, request: &PublishRequest) -> Result<(), PublishError>;
}

/// Routes a publication to the applier responsible for its resource kind.
pub struct KindRoutedPublisher {
	config_maps: Arc<dyn ConfigApplier>,
	secrets: Arc<dyn ConfigApplier>,
	deployment_templates: Arc<dyn ConfigApplier>,
}

impl KindRoutedPublisher {
	pub fn new(
		config_maps: Arc<dyn ConfigApplier>,
		secrets: Arc<dyn ConfigApplier>,
		deployment_templates: Arc<dyn ConfigApplier>,
	) -> Self {
		Self {
			config_maps,
			secrets,
			deployment_templates,
		}
	}

	fn applier(&self, kind: ResourceKind) -> &Arc<dyn ConfigApplier> {
		match kind {
			ResourceKind::ConfigMap => &self.config_maps,
			ResourceKind::Secret => &self.secrets,
			ResourceKind::DeploymentTemplate => &self.deployment_templates,
		}
	}
}

#[async_trait]
impl Publisher for KindRoutedPublisher {
	#[instrument(skip(self, request), fields(kind = %request.kind, app_id = %request.app_id, env_id = %request.env_id))]
	async fn apply(&self, request: &PublishRequest) -> Result<(), PublishError> {
		let applier = self.applier(request.kind);
		let scope = request.scope();
		debug!(applier = applier.name(), ?scope, "applying draft");
		applier.apply(scope, request).await
	}
}
