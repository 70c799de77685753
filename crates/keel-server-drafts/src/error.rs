// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use keel_cel::CelError;
use keel_drafts_core::{CoreError, DraftId, DraftState, DraftVersionId, LockValidation};
use keel_server_db::DbError;
use serde::Serialize;
use uuid::Uuid;

/// Error kinds surfaced to the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	NotAuthorized,
	NotFound,
	StaleBase,
	IllegalTransition,
	ConflictingState,
	SelfApprovalForbidden,
	DuplicateDraft,
	ValidationFailed,
	DependencyFailed,
	Timeout,
	Internal,
}

impl ErrorKind {
	/// Only a lost compare-and-set race is worth retrying as-is.
	pub fn is_retryable(self) -> bool {
		matches!(self, ErrorKind::ConflictingState)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum DraftError {
	#[error("not authorized: {0}")]
	NotAuthorized(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("base version is outdated, latest version is {latest}")]
	StaleBase { latest: DraftVersionId },

	#[error("illegal transition from {from} to {to}")]
	IllegalTransition { from: DraftState, to: DraftState },

	#[error("draft {draft_id} is no longer in state {expected}")]
	ConflictingState {
		draft_id: DraftId,
		expected: DraftState,
	},

	#[error("contributors cannot approve their own draft")]
	SelfApprovalForbidden,

	#[error("a pending draft already exists for {0}")]
	DuplicateDraft(String),

	#[error("validation failed: {0}")]
	ValidationFailed(String),

	/// The payload changes keys locked for its environment. Nothing was written.
	#[error("validation failed: locked keys changed: {}", .0.locked_keys.join(", "))]
	LockedKeys(LockValidation),

	#[error("{dependency} failed: {reason}")]
	DependencyFailed { dependency: String, reason: String },

	#[error("deadline exceeded")]
	Timeout,

	#[error("internal error (correlation id {correlation_id})")]
	Internal { correlation_id: Uuid },
}

impl DraftError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			DraftError::NotAuthorized(_) => ErrorKind::NotAuthorized,
			DraftError::NotFound(_) => ErrorKind::NotFound,
			DraftError::StaleBase { .. } => ErrorKind::StaleBase,
			DraftError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
			DraftError::ConflictingState { .. } => ErrorKind::ConflictingState,
			DraftError::SelfApprovalForbidden => ErrorKind::SelfApprovalForbidden,
			DraftError::DuplicateDraft(_) => ErrorKind::DuplicateDraft,
			DraftError::ValidationFailed(_) | DraftError::LockedKeys(_) => ErrorKind::ValidationFailed,
			DraftError::DependencyFailed { .. } => ErrorKind::DependencyFailed,
			DraftError::Timeout => ErrorKind::Timeout,
			DraftError::Internal { .. } => ErrorKind::Internal,
		}
	}

	/// Logs `cause` under a fresh correlation id and returns the opaque error.
	pub fn internal(cause: impl std::fmt::Display) -> Self {
		let correlation_id = Uuid::new_v4();
		tracing::error!(%correlation_id, error = %cause, "internal error");
		DraftError::Internal { correlation_id }
	}

	pub fn dependency(dependency: impl Into<String>, reason: impl Into<String>) -> Self {
		DraftError::DependencyFailed {
			dependency: dependency.into(),
			reason: reason.into(),
		}
	}
}

impl From<sqlx::Error> for DraftError {
	fn from(e: sqlx::Error) -> Self {
		DraftError::internal(e)
	}
}

impl From<DbError> for DraftError {
	fn from(e: DbError) -> Self {
		DraftError::internal(e)
	}
}

impl From<serde_json::Error> for DraftError {
	fn from(e: serde_json::Error) -> Self {
		DraftError::internal(e)
	}
}

impl From<CelError> for DraftError {
	fn from(e: CelError) -> Self {
		DraftError::ValidationFailed(e.to_string())
	}
}

impl From<CoreError> for DraftError {
	fn from(e: CoreError) -> Self {
		DraftError::ValidationFailed(e.to_string())
	}
}

pub type Result<T> = std::result::Result<T, DraftError>;
