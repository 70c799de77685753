// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{CoreError, Result};
use crate::ids::{AppId, CommentId, DraftId, DraftVersionId, EnvId, UserId};
use crate::types::{DraftAction, DraftState, ResourceKind};

/// Maximum length of a Kubernetes object name.
pub const MAX_RESOURCE_NAME_LEN: usize = 253;

/// A proposed change to one configuration resource of an (app, env).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
	pub id: DraftId,
	pub app_id: AppId,
	pub env_id: EnvId,
	pub kind: ResourceKind,
	pub resource_name: String,
	pub state: DraftState,
	pub created_by: UserId,
	pub created_on: DateTime<Utc>,
	pub updated_by: UserId,
	pub updated_on: DateTime<Utc>,
}

impl Draft {
	/// Validates a resource name for the given kind.
	///
	/// ConfigMap and Secret names must be DNS-1123 subdomains; deployment
	/// templates only need a non-empty name.
	pub fn validate_resource_name(kind: ResourceKind, name: &str) -> Result<()> {
		let valid = if kind.requires_dns_name() {
			is_dns1123_subdomain(name)
		} else {
			!name.trim().is_empty()
		};
		if valid {
			Ok(())
		} else {
			Err(CoreError::InvalidName {
				kind: "resource name",
				value: name.to_string(),
			})
		}
	}
}

fn is_dns1123_subdomain(name: &str) -> bool {
	if name.is_empty() || name.len() > MAX_RESOURCE_NAME_LEN {
		return false;
	}
	let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
	let first_ok = name.chars().next().is_some_and(allowed);
	let last_ok = name.chars().last().is_some_and(allowed);
	first_ok && last_ok && name.chars().all(|c| allowed(c) || c == '-' || c == '.')
}

/// One immutable snapshot of a draft's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftVersion {
	pub id: DraftVersionId,
	pub draft_id: DraftId,
	pub payload: String,
	pub action: DraftAction,
	pub user_id: UserId,
	pub created_on: DateTime<Utc>,
}

/// A draft hydrated with its latest version and the set of contributors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftDetail {
	pub draft: Draft,
	pub latest: DraftVersion,
	pub contributors: BTreeSet<UserId>,
}

impl DraftDetail {
	pub fn is_contributor(&self, user_id: UserId) -> bool {
		self.contributors.contains(&user_id)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftComment {
	pub id: CommentId,
	pub draft_id: DraftId,
	pub version_id: DraftVersionId,
	pub text: String,
	pub user_id: UserId,
	pub active: bool,
	pub created_on: DateTime<Utc>,
	pub updated_on: DateTime<Utc>,
}

/// Comments attached to one version, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentsByVersion {
	pub version_id: DraftVersionId,
	pub comments: Vec<DraftComment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSummary {
	pub draft_id: DraftId,
	pub kind: ResourceKind,
	pub resource_name: String,
	pub state: DraftState,
	pub latest_version_id: DraftVersionId,
	pub updated_by: UserId,
	pub updated_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
	pub version_id: DraftVersionId,
	pub action: DraftAction,
	pub user_id: UserId,
	pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftVersionMetadata {
	pub draft_id: DraftId,
	pub versions: Vec<VersionMetadata>,
}

/// One row of the state audit trail. `from` is `None` for creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
	pub draft_id: DraftId,
	pub from: Option<DraftState>,
	pub to: DraftState,
	pub user_id: UserId,
	pub created_on: DateTime<Utc>,
}

/// What a reader gets back from the draft service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftView {
	pub draft: Draft,
	pub latest_version_id: DraftVersionId,
	pub action: DraftAction,
	pub payload: String,
	pub data_redacted: bool,
	pub can_approve: bool,
	pub comments_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDraft {
	pub app_id: AppId,
	pub env_id: EnvId,
	pub kind: ResourceKind,
	pub resource_name: String,
	pub action: DraftAction,
	pub payload: String,
	pub user_id: UserId,
	pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVersion {
	pub draft_id: DraftId,
	pub base_version_id: DraftVersionId,
	pub payload: String,
	pub action: DraftAction,
	pub user_id: UserId,
	pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
	pub draft_id: DraftId,
	pub version_id: DraftVersionId,
	pub text: String,
	pub user_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedDraft {
	pub draft_id: DraftId,
	pub version_id: DraftVersionId,
	pub state: DraftState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendedVersion {
	pub version_id: DraftVersionId,
	/// The draft was in AwaitApproval and went back to Init.
	pub reverted_to_init: bool,
	/// State of the draft once the contribution is recorded.
	pub state: DraftState,
}
