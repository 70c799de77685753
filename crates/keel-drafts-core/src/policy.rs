// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Approval policy.
//!
//! Pure decision functions over a caller's [`Capabilities`] and the draft being
//! acted on. Decisions are values: a denial carries a reason and is turned into
//! an error by the service layer. State checks (which transitions are legal)
//! live on [`DraftState`](crate::DraftState), not here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::caller::Capabilities;
use crate::draft::Draft;
use crate::ids::UserId;
use crate::types::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
	HasCreate,
	HasUpdate,
	HasApprove,
	Contributor,
	CreatorWithUpdate,
	Creator,
	MissingCreate,
	MissingUpdate,
	MissingApprove,
	SelfApproval,
	NotCreatorOrApprover,
}

impl DecisionReason {
	pub fn describe(self) -> &'static str {
		match self {
			DecisionReason::HasCreate => "caller can create configuration",
			DecisionReason::HasUpdate => "caller can update configuration",
			DecisionReason::HasApprove => "caller can approve configuration",
			DecisionReason::Contributor => "caller contributed to the draft",
			DecisionReason::CreatorWithUpdate => "caller created the draft and can update",
			DecisionReason::Creator => "caller created the draft",
			DecisionReason::MissingCreate => "create permission required",
			DecisionReason::MissingUpdate => "update permission required",
			DecisionReason::MissingApprove => "approve permission required",
			DecisionReason::SelfApproval => "contributors cannot approve their own draft",
			DecisionReason::NotCreatorOrApprover => {
				"only the creator with update permission or an approver may discard"
			}
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
	pub allow: bool,
	pub reason: DecisionReason,
}

impl Decision {
	pub fn allow(reason: DecisionReason) -> Self {
		Self {
			allow: true,
			reason,
		}
	}

	pub fn deny(reason: DecisionReason) -> Self {
		Self {
			allow: false,
			reason,
		}
	}
}

/// Creating a draft needs create permission on the (app, env).
pub fn can_create(caps: &Capabilities) -> Decision {
	if caps.can_create {
		Decision::allow(DecisionReason::HasCreate)
	} else {
		Decision::deny(DecisionReason::MissingCreate)
	}
}

/// Appending a version or a comment.
///
/// Needs create permission. While the draft awaits approval, anyone other than
/// the creator additionally needs update permission.
pub fn can_contribute(caller: UserId, caps: &Capabilities, draft: &Draft, awaiting: bool) -> Decision {
	if !caps.can_create {
		return Decision::deny(DecisionReason::MissingCreate);
	}
	if awaiting && draft.created_by != caller && !caps.can_update {
		return Decision::deny(DecisionReason::MissingUpdate);
	}
	Decision::allow(DecisionReason::HasCreate)
}

/// Submitting the latest version for review.
pub fn can_submit(caller: UserId, caps: &Capabilities, contributors: &BTreeSet<UserId>) -> Decision {
	if contributors.contains(&caller) {
		Decision::allow(DecisionReason::Contributor)
	} else if caps.can_update {
		Decision::allow(DecisionReason::HasUpdate)
	} else {
		Decision::deny(DecisionReason::MissingUpdate)
	}
}

/// Approving (and thereby publishing) a draft.
///
/// The permission check comes first so callers without approve rights learn
/// nothing about who contributed.
pub fn can_approve(caller: UserId, caps: &Capabilities, contributors: &BTreeSet<UserId>) -> Decision {
	if !caps.can_approve {
		Decision::deny(DecisionReason::MissingApprove)
	} else if contributors.contains(&caller) {
		Decision::deny(DecisionReason::SelfApproval)
	} else {
		Decision::allow(DecisionReason::HasApprove)
	}
}

pub fn can_discard(caller: UserId, caps: &Capabilities, draft: &Draft) -> Decision {
	if caps.can_approve {
		Decision::allow(DecisionReason::HasApprove)
	} else if draft.created_by == caller && caps.can_update {
		Decision::allow(DecisionReason::CreatorWithUpdate)
	} else {
		Decision::deny(DecisionReason::NotCreatorOrApprover)
	}
}

/// Deleting a comment. Only its author may.
pub fn can_delete_comment(caller: UserId, author: UserId) -> Decision {
	if caller == author {
		Decision::allow(DecisionReason::Creator)
	} else {
		Decision::deny(DecisionReason::NotCreatorOrApprover)
	}
}

/// Secret payloads are hidden from callers that are neither app admins nor
/// approvers.
pub fn must_redact(kind: ResourceKind, caps: &Capabilities) -> bool {
	kind == ResourceKind::Secret && !caps.is_app_admin && !caps.can_approve
}

/// Whether a reader could approve the draft as it stands.
pub fn reader_can_approve(caller: UserId, caps: &Capabilities, contributors: &BTreeSet<UserId>) -> bool {
	can_approve(caller, caps, contributors).allow
}
