// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Row types shared by the SQLite repositories.

use chrono::{DateTime, SecondsFormat, Utc};
use keel_drafts_core::{
	AppId, CommentId, Draft, DraftAction, DraftComment, DraftId, DraftState, DraftSummary,
	DraftVersion, DraftVersionId, EnvId, ProtectionEntry, ProtectionHistoryEntry, ProtectionState,
	ResourceKind, StateChange, UserId, VersionMetadata,
};

use crate::error::{DraftError, Result};

pub(crate) fn now_rfc3339() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DraftError::internal(format!("invalid timestamp '{value}': {e}")))
}

fn decode<T>(value: i32) -> Result<T>
where
	T: TryFrom<i32, Error = keel_drafts_core::CoreError>,
{
	T::try_from(value).map_err(DraftError::internal)
}

#[derive(sqlx::FromRow)]
pub(crate) struct DraftRow {
	pub id: i64,
	pub app_id: i32,
	pub env_id: i32,
	pub kind: i32,
	pub resource_name: String,
	pub state: i32,
	pub created_by: i32,
	pub created_on: String,
	pub updated_by: i32,
	pub updated_on: String,
}

impl TryFrom<DraftRow> for Draft {
	type Error = DraftError;

	fn try_from(row: DraftRow) -> Result<Self> {
		Ok(Draft {
			id: DraftId(row.id),
			app_id: AppId(row.app_id),
			env_id: EnvId(row.env_id),
			kind: decode::<ResourceKind>(row.kind)?,
			resource_name: row.resource_name,
			state: decode::<DraftState>(row.state)?,
			created_by: UserId(row.created_by),
			created_on: parse_timestamp(&row.created_on)?,
			updated_by: UserId(row.updated_by),
			updated_on: parse_timestamp(&row.updated_on)?,
		})
	}
}

#[derive(sqlx::FromRow)]
pub(crate) struct VersionRow {
	pub id: i64,
	pub draft_id: i64,
	pub payload: String,
	pub action: i32,
	pub user_id: i32,
	pub created_on: String,
}

impl TryFrom<VersionRow> for DraftVersion {
	type Error = DraftError;

	fn try_from(row: VersionRow) -> Result<Self> {
		Ok(DraftVersion {
			id: DraftVersionId(row.id),
			draft_id: DraftId(row.draft_id),
			payload: row.payload,
			action: decode::<DraftAction>(row.action)?,
			user_id: UserId(row.user_id),
			created_on: parse_timestamp(&row.created_on)?,
		})
	}
}

#[derive(sqlx::FromRow)]
pub(crate) struct VersionMetadataRow {
	pub id: i64,
	pub action: i32,
	pub user_id: i32,
	pub created_on: String,
}

impl TryFrom<VersionMetadataRow> for VersionMetadata {
	type Error = DraftError;

	fn try_from(row: VersionMetadataRow) -> Result<Self> {
		Ok(VersionMetadata {
			version_id: DraftVersionId(row.id),
			action: decode::<DraftAction>(row.action)?,
			user_id: UserId(row.user_id),
			created_on: parse_timestamp(&row.created_on)?,
		})
	}
}

#[derive(sqlx::FromRow)]
pub(crate) struct CommentRow {
	pub id: i64,
	pub draft_id: i64,
	pub version_id: i64,
	pub text: String,
	pub user_id: i32,
	pub active: bool,
	pub created_on: String,
	pub updated_on: String,
}

impl TryFrom<CommentRow> for DraftComment {
	type Error = DraftError;

	fn try_from(row: CommentRow) -> Result<Self> {
		Ok(DraftComment {
			id: CommentId(row.id),
			draft_id: DraftId(row.draft_id),
			version_id: DraftVersionId(row.version_id),
			text: row.text,
			user_id: UserId(row.user_id),
			active: row.active,
			created_on: parse_timestamp(&row.created_on)?,
			updated_on: parse_timestamp(&row.updated_on)?,
		})
	}
}

#[derive(sqlx::FromRow)]
pub(crate) struct SummaryRow {
	pub id: i64,
	pub kind: i32,
	pub resource_name: String,
	pub state: i32,
	pub latest_version_id: i64,
	pub updated_by: i32,
	pub updated_on: String,
}

impl TryFrom<SummaryRow> for DraftSummary {
	type Error = DraftError;

	fn try_from(row: SummaryRow) -> Result<Self> {
		Ok(DraftSummary {
			draft_id: DraftId(row.id),
			kind: decode::<ResourceKind>(row.kind)?,
			resource_name: row.resource_name,
			state: decode::<DraftState>(row.state)?,
			latest_version_id: DraftVersionId(row.latest_version_id),
			updated_by: UserId(row.updated_by),
			updated_on: parse_timestamp(&row.updated_on)?,
		})
	}
}

#[derive(sqlx::FromRow)]
pub(crate) struct StateHistoryRow {
	pub draft_id: i64,
	pub from_state: Option<i32>,
	pub to_state: i32,
	pub user_id: i32,
	pub created_on: String,
}

impl TryFrom<StateHistoryRow> for StateChange {
	type Error = DraftError;

	fn try_from(row: StateHistoryRow) -> Result<Self> {
		Ok(StateChange {
			draft_id: DraftId(row.draft_id),
			from: row.from_state.map(decode::<DraftState>).transpose()?,
			to: decode::<DraftState>(row.to_state)?,
			user_id: UserId(row.user_id),
			created_on: parse_timestamp(&row.created_on)?,
		})
	}
}

#[derive(sqlx::FromRow)]
pub(crate) struct ProtectionRow {
	pub app_id: i32,
	pub env_id: i32,
	pub state: i32,
	pub created_by: i32,
	pub created_on: String,
	pub updated_by: i32,
	pub updated_on: String,
}

impl TryFrom<ProtectionRow> for ProtectionEntry {
	type Error = DraftError;

	fn try_from(row: ProtectionRow) -> Result<Self> {
		Ok(ProtectionEntry {
			app_id: AppId(row.app_id),
			env_id: EnvId(row.env_id),
			state: decode::<ProtectionState>(row.state)?,
			created_by: UserId(row.created_by),
			created_on: parse_timestamp(&row.created_on)?,
			updated_by: UserId(row.updated_by),
			updated_on: parse_timestamp(&row.updated_on)?,
		})
	}
}

#[derive(sqlx::FromRow)]
pub(crate) struct ProtectionHistoryRow {
	pub id: i64,
	pub app_id: i32,
	pub env_id: i32,
	pub state: i32,
	pub updated_by: i32,
	pub updated_on: String,
}

impl TryFrom<ProtectionHistoryRow> for ProtectionHistoryEntry {
	type Error = DraftError;

	fn try_from(row: ProtectionHistoryRow) -> Result<Self> {
		Ok(ProtectionHistoryEntry {
			id: row.id,
			app_id: AppId(row.app_id),
			env_id: EnvId(row.env_id),
			state: decode::<ProtectionState>(row.state)?,
			updated_by: UserId(row.updated_by),
			updated_on: parse_timestamp(&row.updated_on)?,
		})
	}
}
