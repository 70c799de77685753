// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The draft lifecycle.
//!
//! [`DraftService`] validates requests, asks the approval policy, and drives the
//! store and the publisher. Every operation runs under the caller's deadline
//! (or the configured default); on expiry it returns
//! [`DraftError::Timeout`](crate::DraftError::Timeout) and the open
//! transaction is rolled back.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use keel_cel::ExpressionParams;
use keel_drafts_core::policy::{self, Decision, DecisionReason};
use keel_drafts_core::{
	AppId, AppendedVersion, CallerContext, Capabilities, CommentId, CommentsByVersion,
	CreatedDraft, Draft, DraftAction, DraftDetail, DraftId, DraftState, DraftSummary,
	DraftVersionId, DraftVersionMetadata, DraftView, EnvId, LockValidation, NewComment, NewDraft,
	NewVersion, ResourceKind, StateChange, UserId,
};
use keel_redact::Redactor;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::deadline::run_until;
use crate::error::{DraftError, Result};
use crate::lock::LockValidator;
use crate::protection::ProtectionRegistry;
use crate::publisher::{PublishRequest, Publisher};
use crate::store::DraftStore;
use crate::validator::{ConfigValidator, ValidatorError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDraftRequest {
	pub app_id: AppId,
	pub env_id: EnvId,
	pub kind: ResourceKind,
	pub resource_name: String,
	pub action: DraftAction,
	pub payload: String,
	#[serde(default)]
	pub comment: Option<String>,
}

/// A contribution to an existing draft: a new version, a comment, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddVersionRequest {
	pub draft_id: DraftId,
	/// The version the caller edited. Must still be the latest.
	pub last_version_id: DraftVersionId,
	pub action: DraftAction,
	#[serde(default)]
	pub payload: Option<String>,
	#[serde(default)]
	pub comment: Option<String>,
	/// Submit for approval once the contribution is recorded.
	#[serde(default)]
	pub change_proposed: bool,
}

pub struct DraftService {
	store: Arc<dyn DraftStore>,
	protection: Arc<ProtectionRegistry>,
	publisher: Arc<dyn Publisher>,
	validator: Arc<dyn ConfigValidator>,
	locks: Arc<LockValidator>,
	redactor: Redactor,
	timeout: Duration,
}

/// A version the publisher has accepted but the store has not yet marked
/// Published.
struct Applied {
	draft_id: DraftId,
	version_id: DraftVersionId,
	user_id: UserId,
}

/// Where a payload is headed, for lock checks.
#[derive(Clone, Copy)]
struct LockedTarget<'a> {
	app_id: AppId,
	env_id: EnvId,
	kind: ResourceKind,
	resource_name: &'a str,
	action: DraftAction,
}

impl<'a> LockedTarget<'a> {
	fn of(draft: &'a Draft, action: DraftAction) -> Self {
		Self {
			app_id: draft.app_id,
			env_id: draft.env_id,
			kind: draft.kind,
			resource_name: &draft.resource_name,
			action,
		}
	}
}

fn authorize(decision: Decision) -> Result<()> {
	match (decision.allow, decision.reason) {
		(true, _) => Ok(()),
		(false, DecisionReason::SelfApproval) => Err(DraftError::SelfApprovalForbidden),
		(false, reason) => Err(DraftError::NotAuthorized(reason.describe().to_string())),
	}
}

fn ensure_latest(detail: &DraftDetail, version_id: DraftVersionId) -> Result<()> {
	let latest = detail.latest.id;
	if version_id < latest {
		Err(DraftError::StaleBase { latest })
	} else if version_id > latest {
		Err(DraftError::ValidationFailed(format!(
			"version {version_id} does not belong to draft {}",
			detail.draft.id
		)))
	} else {
		Ok(())
	}
}

fn non_empty(value: Option<String>) -> Option<String> {
	value.filter(|v| !v.trim().is_empty())
}

impl DraftService {
	pub fn new(
		store: Arc<dyn DraftStore>,
		protection: Arc<ProtectionRegistry>,
		publisher: Arc<dyn Publisher>,
		validator: Arc<dyn ConfigValidator>,
		locks: Arc<LockValidator>,
		redactor: Redactor,
		timeout: Duration,
	) -> Self {
		Self {
			store,
			protection,
			publisher,
			validator,
			locks,
			redactor,
			timeout,
		}
	}

	async fn within<T, F>(&self, caller: &CallerContext, name: &'static str, operation: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		run_until(caller.deadline(), self.timeout, name, operation).await
	}

	async fn load(&self, draft_id: DraftId) -> Result<DraftDetail> {
		self.store
			.get_draft(draft_id)
			.await?
			.ok_or_else(|| DraftError::NotFound(format!("draft {draft_id}")))
	}

	async fn require_protection(&self, caller: &CallerContext, draft_app: AppId, draft_env: EnvId) -> Result<()> {
		if self
			.protection
			.is_enabled(draft_app, draft_env, caller.deadline())
			.await?
		{
			Ok(())
		} else {
			Err(DraftError::ValidationFailed(format!(
				"config protection is disabled for app {draft_app} env {draft_env}"
			)))
		}
	}

	/// Rejects a deployment template that changes keys locked for its
	/// environment. App admins are exempt, and a Delete writes no keys.
	async fn check_locks(&self, caps: &Capabilities, draft: LockedTarget<'_>, payload: &str) -> Result<()> {
		if draft.kind != ResourceKind::DeploymentTemplate
			|| draft.action == DraftAction::Delete
			|| caps.is_app_admin
		{
			return Ok(());
		}
		let validation = self
			.locks
			.validate_target(draft.app_id, draft.env_id, draft.resource_name, payload)
			.await?;
		if validation.is_locked {
			warn!(locked_keys = ?validation.locked_keys, "deployment template changes locked keys");
			return Err(DraftError::LockedKeys(validation));
		}
		Ok(())
	}

	async fn validate_payload(&self, kind: ResourceKind, action: DraftAction, payload: &str) -> Result<()> {
		match self.validator.validate(kind, action, payload).await {
			Ok(()) => Ok(()),
			Err(ValidatorError::Rejected(reason)) => Err(DraftError::ValidationFailed(reason)),
			Err(ValidatorError::Unavailable(reason)) => {
				Err(DraftError::dependency("config validator", reason))
			}
		}
	}

	#[instrument(
		skip(self, caller, request),
		fields(user_id = %caller.user_id(), app_id = %request.app_id, env_id = %request.env_id, kind = %request.kind)
	)]
	pub async fn create_draft(&self, caller: &CallerContext, request: CreateDraftRequest) -> Result<CreatedDraft> {
		self.within(caller, "create_draft", async {
			Draft::validate_resource_name(request.kind, &request.resource_name)?;
			let caps = caller.capabilities(request.app_id, request.env_id);
			authorize(policy::can_create(&caps))?;
			self.require_protection(caller, request.app_id, request.env_id)
				.await?;
			self.validate_payload(request.kind, request.action, &request.payload)
				.await?;
			let target = LockedTarget {
				app_id: request.app_id,
				env_id: request.env_id,
				kind: request.kind,
				resource_name: &request.resource_name,
				action: request.action,
			};
			self.check_locks(&caps, target, &request.payload).await?;

			self.store
				.create_draft(&NewDraft {
					app_id: request.app_id,
					env_id: request.env_id,
					kind: request.kind,
					resource_name: request.resource_name.clone(),
					action: request.action,
					payload: request.payload.clone(),
					user_id: caller.user_id(),
					comment: non_empty(request.comment.clone()),
				})
				.await
		})
		.await
	}

	#[instrument(
		skip(self, caller, request),
		fields(user_id = %caller.user_id(), draft_id = %request.draft_id, change_proposed = request.change_proposed)
	)]
	pub async fn add_draft_version(
		&self,
		caller: &CallerContext,
		request: AddVersionRequest,
	) -> Result<AppendedVersion> {
		self.within(caller, "add_draft_version", async {
			let user_id = caller.user_id();
			let detail = self.load(request.draft_id).await?;
			let draft = &detail.draft;
			if draft.state.is_terminal() {
				return Err(DraftError::IllegalTransition {
					from: draft.state,
					to: DraftState::Init,
				});
			}

			let caps = caller.capabilities(draft.app_id, draft.env_id);
			let awaiting = draft.state == DraftState::AwaitApproval;
			authorize(policy::can_contribute(user_id, &caps, draft, awaiting))?;
			self.require_protection(caller, draft.app_id, draft.env_id)
				.await?;

			let payload = non_empty(request.payload.clone());
			let comment = non_empty(request.comment.clone());
			if payload.is_none() && comment.is_none() {
				return Err(DraftError::ValidationFailed(
					"a contribution needs a payload or a comment".to_string(),
				));
			}
			ensure_latest(&detail, request.last_version_id)?;

			if request.change_proposed {
				let mut contributors = detail.contributors.clone();
				if payload.is_some() {
					contributors.insert(user_id);
				}
				authorize(policy::can_submit(user_id, &caps, &contributors))?;
			}

			let mut appended = match payload {
				Some(payload) => {
					self.validate_payload(draft.kind, request.action, &payload)
						.await?;
					let target = LockedTarget::of(draft, request.action);
					self.check_locks(&caps, target, &payload).await?;
					self.store
						.append_version(&NewVersion {
							draft_id: draft.id,
							base_version_id: request.last_version_id,
							payload,
							action: request.action,
							user_id,
							comment,
						})
						.await?
				}
				None => {
					self.store
						.add_comment(&NewComment {
							draft_id: draft.id,
							version_id: detail.latest.id,
							text: comment.unwrap_or_default(),
							user_id,
						})
						.await?;
					AppendedVersion {
						version_id: detail.latest.id,
						reverted_to_init: false,
						state: draft.state,
					}
				}
			};

			if request.change_proposed && appended.state == DraftState::Init {
				self.store
					.transition_state(
						draft.id,
						DraftState::Init,
						DraftState::AwaitApproval,
						user_id,
						Some(appended.version_id),
					)
					.await?;
				appended.state = DraftState::AwaitApproval;
			}
			Ok(appended)
		})
		.await
	}

	/// Moves a draft along the state machine. Publishing goes through
	/// [`DraftService::approve_draft`] semantics.
	#[instrument(skip(self, caller), fields(user_id = %caller.user_id(), draft_id = %draft_id, to = %to))]
	pub async fn update_draft_state(
		&self,
		caller: &CallerContext,
		draft_id: DraftId,
		version_id: DraftVersionId,
		to: DraftState,
	) -> Result<DraftState> {
		let (from, applied) = self.within(caller, "update_draft_state", async {
			let user_id = caller.user_id();
			let detail = self.load(draft_id).await?;
			let from = detail.draft.state;
			if !from.allows_transition(to) {
				return Err(DraftError::IllegalTransition { from, to });
			}
			let caps = caller.capabilities(detail.draft.app_id, detail.draft.env_id);

			let mut applied = None;
			match to {
				DraftState::AwaitApproval => {
					authorize(policy::can_submit(user_id, &caps, &detail.contributors))?;
					ensure_latest(&detail, version_id)?;
					self.store
						.transition_state(draft_id, from, to, user_id, Some(version_id))
						.await?;
				}
				DraftState::Discarded => {
					authorize(policy::can_discard(user_id, &caps, &detail.draft))?;
					self.store
						.transition_state(draft_id, from, to, user_id, None)
						.await?;
				}
				DraftState::Published => {
					applied = Some(self.apply(caller, &caps, &detail, version_id).await?);
				}
				DraftState::Init => return Err(DraftError::IllegalTransition { from, to }),
			}
			Ok((from, applied))
		})
		.await?;

		// Once the publisher has accepted the configuration the Published write
		// must land, so it runs outside the deadline.
		if let Some(applied) = applied {
			self.mark_published(applied).await?;
		}
		info!(from = %from, "draft state updated");
		Ok(to)
	}

	/// Approves `version_id` and applies it.
	pub async fn approve_draft(
		&self,
		caller: &CallerContext,
		draft_id: DraftId,
		version_id: DraftVersionId,
	) -> Result<DraftState> {
		self.update_draft_state(caller, draft_id, version_id, DraftState::Published)
			.await
	}

	async fn apply(
		&self,
		caller: &CallerContext,
		caps: &Capabilities,
		detail: &DraftDetail,
		version_id: DraftVersionId,
	) -> Result<Applied> {
		let user_id = caller.user_id();
		authorize(policy::can_approve(user_id, caps, &detail.contributors))?;
		ensure_latest(detail, version_id)?;
		let target = LockedTarget::of(&detail.draft, detail.latest.action);
		self.check_locks(caps, target, &detail.latest.payload).await?;

		let request = PublishRequest {
			kind: detail.draft.kind,
			app_id: detail.draft.app_id,
			env_id: detail.draft.env_id,
			resource_name: detail.draft.resource_name.clone(),
			action: detail.latest.action,
			payload: detail.latest.payload.clone(),
			user_id,
		};
		if let Err(e) = self.publisher.apply(&request).await {
			warn!(draft_id = %detail.draft.id, error = %e, "publication failed, draft left awaiting approval");
			return Err(DraftError::dependency("publisher", e.to_string()));
		}
		Ok(Applied {
			draft_id: detail.draft.id,
			version_id,
			user_id,
		})
	}

	async fn mark_published(&self, applied: Applied) -> Result<()> {
		self.store
			.transition_state(
				applied.draft_id,
				DraftState::AwaitApproval,
				DraftState::Published,
				applied.user_id,
				Some(applied.version_id),
			)
			.await?;
		info!(draft_id = %applied.draft_id, version_id = %applied.version_id, "draft published");
		Ok(())
	}

	fn view(&self, caller: &CallerContext, detail: DraftDetail, comments_count: u64) -> DraftView {
		let user_id = caller.user_id();
		let caps = caller.capabilities(detail.draft.app_id, detail.draft.env_id);
		let can_approve = policy::reader_can_approve(user_id, &caps, &detail.contributors);
		let data_redacted = policy::must_redact(detail.draft.kind, &caps);
		let payload = if data_redacted {
			self.redactor.redact(&detail.latest.payload)
		} else {
			detail.latest.payload
		};
		DraftView {
			draft: detail.draft,
			latest_version_id: detail.latest.id,
			action: detail.latest.action,
			payload,
			data_redacted,
			can_approve,
			comments_count,
		}
	}

	#[instrument(skip(self, caller), fields(user_id = %caller.user_id(), draft_id = %draft_id))]
	pub async fn get_draft_by_id(&self, caller: &CallerContext, draft_id: DraftId) -> Result<DraftView> {
		self.within(caller, "get_draft_by_id", async {
			let detail = self.load(draft_id).await?;
			let comments = self.store.count_active_comments(draft_id).await?;
			Ok(self.view(caller, detail, comments))
		})
		.await
	}

	#[instrument(skip(self, caller, resource_name), fields(user_id = %caller.user_id(), app_id = %app_id, env_id = %env_id, kind = %kind))]
	pub async fn get_draft_by_name(
		&self,
		caller: &CallerContext,
		app_id: AppId,
		env_id: EnvId,
		kind: ResourceKind,
		resource_name: &str,
	) -> Result<Option<DraftView>> {
		self.within(caller, "get_draft_by_name", async {
			let Some(detail) = self
				.store
				.get_draft_by_name(app_id, env_id, kind, resource_name)
				.await?
			else {
				return Ok(None);
			};
			let comments = self.store.count_active_comments(detail.draft.id).await?;
			Ok(Some(self.view(caller, detail, comments)))
		})
		.await
	}

	#[instrument(skip(self, caller), fields(user_id = %caller.user_id(), app_id = %app_id, env_id = %env_id, kind = %kind))]
	pub async fn list_drafts(
		&self,
		caller: &CallerContext,
		app_id: AppId,
		env_id: EnvId,
		kind: ResourceKind,
	) -> Result<Vec<DraftSummary>> {
		self.within(caller, "list_drafts", self.store.list_drafts(app_id, env_id, kind))
			.await
	}

	pub async fn get_draft_version_metadata(
		&self,
		caller: &CallerContext,
		draft_id: DraftId,
	) -> Result<DraftVersionMetadata> {
		self.within(caller, "get_draft_version_metadata", async {
			let versions = self.store.list_versions(draft_id).await?;
			if versions.is_empty() {
				return Err(DraftError::NotFound(format!("draft {draft_id}")));
			}
			Ok(DraftVersionMetadata { draft_id, versions })
		})
		.await
	}

	/// Active comments grouped by version, newest version first.
	pub async fn get_draft_comments(
		&self,
		caller: &CallerContext,
		draft_id: DraftId,
	) -> Result<Vec<CommentsByVersion>> {
		self.within(caller, "get_draft_comments", async {
			self.load(draft_id).await?;
			let mut grouped: BTreeMap<DraftVersionId, Vec<_>> = BTreeMap::new();
			for comment in self.store.list_comments(draft_id).await? {
				grouped.entry(comment.version_id).or_default().push(comment);
			}
			Ok(grouped
				.into_iter()
				.rev()
				.map(|(version_id, comments)| CommentsByVersion {
					version_id,
					comments,
				})
				.collect())
		})
		.await
	}

	#[instrument(skip(self, caller), fields(user_id = %caller.user_id(), draft_id = %draft_id, comment_id = %comment_id))]
	pub async fn delete_comment(
		&self,
		caller: &CallerContext,
		draft_id: DraftId,
		comment_id: CommentId,
	) -> Result<()> {
		self.within(caller, "delete_comment", async {
			let user_id = caller.user_id();
			let comment = self
				.store
				.get_comment(draft_id, comment_id)
				.await?
				.ok_or_else(|| DraftError::NotFound(format!("comment {comment_id}")))?;
			authorize(policy::can_delete_comment(user_id, comment.user_id))?;
			if self
				.store
				.deactivate_comment(draft_id, comment_id, user_id)
				.await?
			{
				Ok(())
			} else {
				Err(DraftError::NotFound(format!("comment {comment_id}")))
			}
		})
		.await
	}

	/// Pending drafts per environment of an app.
	pub async fn get_drafts_count(
		&self,
		caller: &CallerContext,
		app_id: AppId,
		env_ids: &[EnvId],
	) -> Result<BTreeMap<EnvId, u64>> {
		self.within(caller, "get_drafts_count", self.store.count_drafts(app_id, env_ids))
			.await
	}

	/// State audit trail, oldest first.
	pub async fn list_state_history(
		&self,
		caller: &CallerContext,
		draft_id: DraftId,
	) -> Result<Vec<StateChange>> {
		self.within(caller, "list_state_history", async {
			self.load(draft_id).await?;
			self.store.list_state_history(draft_id).await
		})
		.await
	}

	/// Checks whether the draft's latest payload changes keys locked for its
	/// environment. Nothing is written.
	#[instrument(skip(self, caller, params, live_payload), fields(user_id = %caller.user_id(), draft_id = %draft_id))]
	pub async fn validate_lock_draft(
		&self,
		caller: &CallerContext,
		draft_id: DraftId,
		params: &ExpressionParams,
		live_payload: Option<&str>,
	) -> Result<LockValidation> {
		self.within(caller, "validate_lock_draft", async {
			let detail = self.load(draft_id).await?;
			let caps = caller.capabilities(detail.draft.app_id, detail.draft.env_id);
			if caps.is_app_admin {
				return Ok(LockValidation::unlocked());
			}
			self.locks
				.validate(params, &detail.latest.payload, live_payload)
				.await
		})
		.await
	}
}
