// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Expression-gated key locks.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use keel_cel::{CelEvaluator, ExpressionParams, ParamSchema};
use keel_drafts_core::lock::lookup_path;
use keel_drafts_core::{AppId, EnvId, LockRule, LockValidation};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{DraftError, Result};

#[derive(Debug, thiserror::Error)]
#[error("lock rules unavailable: {0}")]
pub struct LockRuleError(pub String);

/// Where lock rules are configured.
#[async_trait]
pub trait LockRuleSource: Send + Sync {
	async fn rules(&self) -> std::result::Result<Vec<LockRule>, LockRuleError>;
}

/// A fixed rule list, for configuration files and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticLockRules(pub Vec<LockRule>);

#[async_trait]
impl LockRuleSource for StaticLockRules {
	async fn rules(&self) -> std::result::Result<Vec<LockRule>, LockRuleError> {
		Ok(self.0.clone())
	}
}

/// What a deployment template is checked against while it is authored: the
/// target environment's expression parameters and its applied template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockTarget {
	pub params: ExpressionParams,
	pub live_payload: Option<String>,
}

/// Resolves the [`LockTarget`] of a deployment template. Owned by the
/// deployment subsystem.
#[async_trait]
pub trait LockTargetSource: Send + Sync {
	async fn target(
		&self,
		app_id: AppId,
		env_id: EnvId,
		resource_name: &str,
	) -> std::result::Result<LockTarget, LockRuleError>;
}

/// The same target for every template.
#[derive(Debug, Clone, Default)]
pub struct StaticLockTarget(pub LockTarget);

#[async_trait]
impl LockTargetSource for StaticLockTarget {
	async fn target(
		&self,
		_app_id: AppId,
		_env_id: EnvId,
		_resource_name: &str,
	) -> std::result::Result<LockTarget, LockRuleError> {
		Ok(self.0.clone())
	}
}

pub struct LockValidator {
	source: Arc<dyn LockRuleSource>,
	targets: Arc<dyn LockTargetSource>,
	cel: Arc<CelEvaluator>,
}

impl LockValidator {
	pub fn new(
		source: Arc<dyn LockRuleSource>,
		targets: Arc<dyn LockTargetSource>,
		cel: Arc<CelEvaluator>,
	) -> Self {
		Self {
			source,
			targets,
			cel,
		}
	}

	/// Compiles every rule expression so broken rules fail at startup.
	pub async fn precompile(&self, schema: &ParamSchema) -> Result<usize> {
		let rules = self.load_rules().await?;
		self.cel
			.precompile(rules.iter().map(|r| r.expression.as_str()), schema)?;
		debug!(rules = rules.len(), "lock rules compiled");
		Ok(rules.len())
	}

	/// Reports which locked keys differ between `draft_payload` and
	/// `live_payload`, considering only rules whose expression holds for
	/// `params`.
	#[instrument(skip_all, fields(params = params.len()))]
	pub async fn validate(
		&self,
		params: &ExpressionParams,
		draft_payload: &str,
		live_payload: Option<&str>,
	) -> Result<LockValidation> {
		let rules = self.load_rules().await?;
		self.check(rules, params, draft_payload, live_payload)
	}

	/// Checks `draft_payload` against the live template of its target. The
	/// target is only resolved when some rule is configured.
	#[instrument(skip(self, draft_payload), fields(app_id = %app_id, env_id = %env_id))]
	pub async fn validate_target(
		&self,
		app_id: AppId,
		env_id: EnvId,
		resource_name: &str,
		draft_payload: &str,
	) -> Result<LockValidation> {
		let rules = self.load_rules().await?;
		if rules.is_empty() {
			return Ok(LockValidation::unlocked());
		}
		let target = self
			.targets
			.target(app_id, env_id, resource_name)
			.await
			.map_err(|e| DraftError::dependency("lock target source", e.0))?;
		self.check(
			rules,
			&target.params,
			draft_payload,
			target.live_payload.as_deref(),
		)
	}

	fn check(
		&self,
		rules: Vec<LockRule>,
		params: &ExpressionParams,
		draft_payload: &str,
		live_payload: Option<&str>,
	) -> Result<LockValidation> {
		let draft: Value = serde_json::from_str(draft_payload).map_err(|e| {
			DraftError::ValidationFailed(format!("draft payload is not valid JSON: {e}"))
		})?;
		let live: Value = match live_payload {
			Some(live) => serde_json::from_str(live).map_err(|e| {
				DraftError::ValidationFailed(format!("live payload is not valid JSON: {e}"))
			})?,
			None => Value::Object(Default::default()),
		};

		let mut applicable = Vec::new();
		for rule in rules {
			if self.cel.evaluate(&rule.expression, params)? {
				applicable.push(rule);
			}
		}
		Ok(compare_locked_keys(&applicable, &draft, &live))
	}

	async fn load_rules(&self) -> Result<Vec<LockRule>> {
		self.source
			.rules()
			.await
			.map_err(|e| DraftError::dependency("lock rule source", e.0))
	}
}

fn compare_locked_keys(rules: &[LockRule], draft: &Value, live: &Value) -> LockValidation {
	let locked: BTreeSet<String> = rules
		.iter()
		.flat_map(|rule| rule.locked_keys.iter())
		.filter(|key| lookup_path(draft, key) != lookup_path(live, key))
		.cloned()
		.collect();
	LockValidation {
		is_locked: !locked.is_empty(),
		locked_keys: locked.into_iter().collect(),
		applicable_rules: rules.len(),
	}
}
