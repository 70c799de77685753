// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transactional persistence of drafts, versions, comments and the state
//! audit trail.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use keel_drafts_core::{
	AppId, AppendedVersion, CommentId, CreatedDraft, Draft, DraftComment, DraftDetail, DraftId,
	DraftState, DraftSummary, DraftVersion, DraftVersionId, EnvId, NewComment, NewDraft,
	NewVersion, ResourceKind, StateChange, UserId, VersionMetadata,
};
use keel_server_db::begin_immediate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, instrument};

use crate::error::{DraftError, Result};
use crate::rows::{
	now_rfc3339, CommentRow, DraftRow, StateHistoryRow, SummaryRow, VersionMetadataRow, VersionRow,
};

const PENDING_STATES: &str = "(0, 3)";

/// Persistence contract for drafts.
///
/// Every method that writes more than one row runs in a single transaction.
/// Reads return `None` or an empty collection rather than an error when
/// nothing matches.
#[async_trait]
pub trait DraftStore: Send + Sync {
	/// Inserts the draft, its first version, an optional comment and the
	/// creation audit row.
	async fn create_draft(&self, new: &NewDraft) -> Result<CreatedDraft>;

	/// Appends a version on top of `base_version_id`, reverting an
	/// AwaitApproval draft to Init.
	async fn append_version(&self, new: &NewVersion) -> Result<AppendedVersion>;

	async fn add_comment(&self, new: &NewComment) -> Result<CommentId>;

	async fn get_draft(&self, draft_id: DraftId) -> Result<Option<DraftDetail>>;

	/// The single pending draft for a target, if any.
	async fn get_draft_by_name(
		&self,
		app_id: AppId,
		env_id: EnvId,
		kind: ResourceKind,
		resource_name: &str,
	) -> Result<Option<DraftDetail>>;

	/// Pending drafts of one kind for an (app, env).
	async fn list_drafts(
		&self,
		app_id: AppId,
		env_id: EnvId,
		kind: ResourceKind,
	) -> Result<Vec<DraftSummary>>;

	/// Newest first.
	async fn list_versions(&self, draft_id: DraftId) -> Result<Vec<VersionMetadata>>;

	/// Active comments, newest first.
	async fn list_comments(&self, draft_id: DraftId) -> Result<Vec<DraftComment>>;

	async fn get_comment(
		&self,
		draft_id: DraftId,
		comment_id: CommentId,
	) -> Result<Option<DraftComment>>;

	async fn count_active_comments(&self, draft_id: DraftId) -> Result<u64>;

	/// Pending draft counts per environment. Every requested environment is
	/// present in the result.
	async fn count_drafts(&self, app_id: AppId, env_ids: &[EnvId]) -> Result<BTreeMap<EnvId, u64>>;

	/// Compare-and-set on the draft state. With `at_version` the latest version
	/// must also still be that version.
	async fn transition_state(
		&self,
		draft_id: DraftId,
		expected_from: DraftState,
		to: DraftState,
		user_id: UserId,
		at_version: Option<DraftVersionId>,
	) -> Result<()>;

	/// Soft-deletes a comment written by `user_id`. Returns false when no
	/// matching active comment exists.
	async fn deactivate_comment(
		&self,
		draft_id: DraftId,
		comment_id: CommentId,
		user_id: UserId,
	) -> Result<bool>;

	/// Discards every Init draft of an (app, env) and returns their ids.
	async fn discard_pending(
		&self,
		app_id: AppId,
		env_id: EnvId,
		user_id: UserId,
	) -> Result<Vec<DraftId>>;

	/// Oldest first.
	async fn list_state_history(&self, draft_id: DraftId) -> Result<Vec<StateChange>>;
}

#[derive(Clone)]
pub struct SqliteDraftStore {
	pool: SqlitePool,
}

impl SqliteDraftStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

fn target_label(app_id: AppId, env_id: EnvId, kind: ResourceKind, name: &str) -> String {
	format!("app {app_id} env {env_id} {kind} '{name}'")
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
	matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

async fn fetch_draft(conn: &mut SqliteConnection, draft_id: DraftId) -> Result<Option<Draft>> {
	let row = sqlx::query_as::<_, DraftRow>(
		r#"
		SELECT id, app_id, env_id, kind, resource_name, state,
			created_by, created_on, updated_by, updated_on
		FROM drafts
		WHERE id = ?
		"#,
	)
	.bind(draft_id.0)
	.fetch_optional(&mut *conn)
	.await?;

	row.map(TryInto::try_into).transpose()
}

async fn latest_version_id(
	conn: &mut SqliteConnection,
	draft_id: DraftId,
) -> Result<Option<DraftVersionId>> {
	let latest: Option<i64> =
		sqlx::query_scalar("SELECT MAX(id) FROM draft_versions WHERE draft_id = ?")
			.bind(draft_id.0)
			.fetch_one(&mut *conn)
			.await?;
	Ok(latest.map(DraftVersionId))
}

async fn hydrate(conn: &mut SqliteConnection, draft: Draft) -> Result<DraftDetail> {
	let latest = sqlx::query_as::<_, VersionRow>(
		r#"
		SELECT id, draft_id, payload, action, user_id, created_on
		FROM draft_versions
		WHERE draft_id = ?
		ORDER BY id DESC
		LIMIT 1
		"#,
	)
	.bind(draft.id.0)
	.fetch_optional(&mut *conn)
	.await?
	.ok_or_else(|| DraftError::internal(format!("draft {} has no versions", draft.id)))?;

	let contributors: Vec<i32> =
		sqlx::query_scalar("SELECT DISTINCT user_id FROM draft_versions WHERE draft_id = ?")
			.bind(draft.id.0)
			.fetch_all(&mut *conn)
			.await?;

	Ok(DraftDetail {
		draft,
		latest: DraftVersion::try_from(latest)?,
		contributors: contributors.into_iter().map(UserId).collect::<BTreeSet<_>>(),
	})
}

async fn insert_version(
	conn: &mut SqliteConnection,
	draft_id: DraftId,
	payload: &str,
	action: i32,
	user_id: UserId,
	now: &str,
) -> Result<DraftVersionId> {
	let result = sqlx::query(
		r#"
		INSERT INTO draft_versions (draft_id, payload, action, user_id, created_on)
		VALUES (?, ?, ?, ?, ?)
		"#,
	)
	.bind(draft_id.0)
	.bind(payload)
	.bind(action)
	.bind(user_id.0)
	.bind(now)
	.execute(&mut *conn)
	.await?;
	Ok(DraftVersionId(result.last_insert_rowid()))
}

async fn insert_comment(
	conn: &mut SqliteConnection,
	draft_id: DraftId,
	version_id: DraftVersionId,
	text: &str,
	user_id: UserId,
	now: &str,
) -> Result<CommentId> {
	let result = sqlx::query(
		r#"
		INSERT INTO draft_comments (draft_id, version_id, text, user_id, active, created_on, updated_on)
		VALUES (?, ?, ?, ?, 1, ?, ?)
		"#,
	)
	.bind(draft_id.0)
	.bind(version_id.0)
	.bind(text)
	.bind(user_id.0)
	.bind(now)
	.bind(now)
	.execute(&mut *conn)
	.await?;
	Ok(CommentId(result.last_insert_rowid()))
}

async fn record_transition(
	conn: &mut SqliteConnection,
	draft_id: DraftId,
	from: Option<DraftState>,
	to: DraftState,
	user_id: UserId,
	now: &str,
) -> Result<()> {
	sqlx::query(
		r#"
		INSERT INTO draft_state_history (draft_id, from_state, to_state, user_id, created_on)
		VALUES (?, ?, ?, ?, ?)
		"#,
	)
	.bind(draft_id.0)
	.bind(from.map(DraftState::as_i32))
	.bind(to.as_i32())
	.bind(user_id.0)
	.bind(now)
	.execute(&mut *conn)
	.await?;
	Ok(())
}

fn non_empty(comment: &Option<String>) -> Option<&str> {
	comment.as_deref().map(str::trim).filter(|c| !c.is_empty())
}

#[async_trait]
impl DraftStore for SqliteDraftStore {
	#[instrument(skip(self, new), fields(app_id = %new.app_id, env_id = %new.env_id, kind = %new.kind))]
	async fn create_draft(&self, new: &NewDraft) -> Result<CreatedDraft> {
		let now = now_rfc3339();
		let target = target_label(new.app_id, new.env_id, new.kind, &new.resource_name);
		let mut tx = begin_immediate(&self.pool).await?;

		let existing: Option<i64> = sqlx::query_scalar(&format!(
			"SELECT id FROM drafts WHERE app_id = ? AND env_id = ? AND kind = ? AND resource_name = ? AND state IN {PENDING_STATES}"
		))
		.bind(new.app_id.0)
		.bind(new.env_id.0)
		.bind(new.kind.as_i32())
		.bind(&new.resource_name)
		.fetch_optional(&mut *tx)
		.await?;
		if existing.is_some() {
			return Err(DraftError::DuplicateDraft(target));
		}

		let inserted = sqlx::query(
			r#"
			INSERT INTO drafts (app_id, env_id, kind, resource_name, state, created_by, created_on, updated_by, updated_on)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(new.app_id.0)
		.bind(new.env_id.0)
		.bind(new.kind.as_i32())
		.bind(&new.resource_name)
		.bind(DraftState::Init.as_i32())
		.bind(new.user_id.0)
		.bind(&now)
		.bind(new.user_id.0)
		.bind(&now)
		.execute(&mut *tx)
		.await;

		let draft_id = match inserted {
			Ok(result) => DraftId(result.last_insert_rowid()),
			Err(e) if is_unique_violation(&e) => return Err(DraftError::DuplicateDraft(target)),
			Err(e) => return Err(e.into()),
		};

		let version_id = insert_version(
			&mut tx,
			draft_id,
			&new.payload,
			new.action.as_i32(),
			new.user_id,
			&now,
		)
		.await?;
		if let Some(text) = non_empty(&new.comment) {
			insert_comment(&mut tx, draft_id, version_id, text, new.user_id, &now).await?;
		}
		record_transition(&mut tx, draft_id, None, DraftState::Init, new.user_id, &now).await?;

		tx.commit().await?;

		info!(draft_id = %draft_id, version_id = %version_id, "draft created");
		Ok(CreatedDraft {
			draft_id,
			version_id,
			state: DraftState::Init,
		})
	}

	#[instrument(skip(self, new), fields(draft_id = %new.draft_id, base_version_id = %new.base_version_id))]
	async fn append_version(&self, new: &NewVersion) -> Result<AppendedVersion> {
		let now = now_rfc3339();
		let mut tx = begin_immediate(&self.pool).await?;

		let draft = fetch_draft(&mut tx, new.draft_id)
			.await?
			.ok_or_else(|| DraftError::NotFound(format!("draft {}", new.draft_id)))?;
		if draft.state.is_terminal() {
			return Err(DraftError::IllegalTransition {
				from: draft.state,
				to: DraftState::Init,
			});
		}

		let latest = latest_version_id(&mut tx, new.draft_id)
			.await?
			.ok_or_else(|| DraftError::internal(format!("draft {} has no versions", new.draft_id)))?;
		if new.base_version_id < latest {
			return Err(DraftError::StaleBase { latest });
		}
		if new.base_version_id > latest {
			return Err(DraftError::ValidationFailed(format!(
				"version {} does not belong to draft {}",
				new.base_version_id, new.draft_id
			)));
		}

		let version_id = insert_version(
			&mut tx,
			new.draft_id,
			&new.payload,
			new.action.as_i32(),
			new.user_id,
			&now,
		)
		.await?;
		if let Some(text) = non_empty(&new.comment) {
			insert_comment(&mut tx, new.draft_id, version_id, text, new.user_id, &now).await?;
		}

		let reverted_to_init = draft.state == DraftState::AwaitApproval;
		sqlx::query("UPDATE drafts SET state = ?, updated_by = ?, updated_on = ? WHERE id = ?")
			.bind(DraftState::Init.as_i32())
			.bind(new.user_id.0)
			.bind(&now)
			.bind(new.draft_id.0)
			.execute(&mut *tx)
			.await?;
		if reverted_to_init {
			record_transition(
				&mut tx,
				new.draft_id,
				Some(DraftState::AwaitApproval),
				DraftState::Init,
				new.user_id,
				&now,
			)
			.await?;
		}

		tx.commit().await?;

		info!(version_id = %version_id, reverted_to_init, "draft version appended");
		Ok(AppendedVersion {
			version_id,
			reverted_to_init,
			state: DraftState::Init,
		})
	}

	#[instrument(skip(self, new), fields(draft_id = %new.draft_id, version_id = %new.version_id))]
	async fn add_comment(&self, new: &NewComment) -> Result<CommentId> {
		let now = now_rfc3339();
		let mut tx = begin_immediate(&self.pool).await?;

		let draft = fetch_draft(&mut tx, new.draft_id)
			.await?
			.ok_or_else(|| DraftError::NotFound(format!("draft {}", new.draft_id)))?;
		if draft.state.is_terminal() {
			return Err(DraftError::IllegalTransition {
				from: draft.state,
				to: draft.state,
			});
		}

		let belongs: Option<i64> =
			sqlx::query_scalar("SELECT id FROM draft_versions WHERE id = ? AND draft_id = ?")
				.bind(new.version_id.0)
				.bind(new.draft_id.0)
				.fetch_optional(&mut *tx)
				.await?;
		if belongs.is_none() {
			return Err(DraftError::NotFound(format!(
				"version {} of draft {}",
				new.version_id, new.draft_id
			)));
		}

		let comment_id = insert_comment(
			&mut tx,
			new.draft_id,
			new.version_id,
			new.text.trim(),
			new.user_id,
			&now,
		)
		.await?;
		tx.commit().await?;
		Ok(comment_id)
	}

	#[instrument(skip(self), fields(draft_id = %draft_id))]
	async fn get_draft(&self, draft_id: DraftId) -> Result<Option<DraftDetail>> {
		let mut tx = self.pool.begin().await?;
		let detail = match fetch_draft(&mut tx, draft_id).await? {
			Some(draft) => Some(hydrate(&mut tx, draft).await?),
			None => None,
		};
		tx.commit().await?;
		Ok(detail)
	}

	#[instrument(skip(self, resource_name), fields(app_id = %app_id, env_id = %env_id, kind = %kind))]
	async fn get_draft_by_name(
		&self,
		app_id: AppId,
		env_id: EnvId,
		kind: ResourceKind,
		resource_name: &str,
	) -> Result<Option<DraftDetail>> {
		let mut tx = self.pool.begin().await?;
		let row = sqlx::query_as::<_, DraftRow>(&format!(
			r#"
			SELECT id, app_id, env_id, kind, resource_name, state,
				created_by, created_on, updated_by, updated_on
			FROM drafts
			WHERE app_id = ? AND env_id = ? AND kind = ? AND resource_name = ? AND state IN {PENDING_STATES}
			"#
		))
		.bind(app_id.0)
		.bind(env_id.0)
		.bind(kind.as_i32())
		.bind(resource_name)
		.fetch_optional(&mut *tx)
		.await?;

		let detail = match row {
			Some(row) => Some(hydrate(&mut tx, row.try_into()?).await?),
			None => None,
		};
		tx.commit().await?;
		Ok(detail)
	}

	#[instrument(skip(self), fields(app_id = %app_id, env_id = %env_id, kind = %kind))]
	async fn list_drafts(
		&self,
		app_id: AppId,
		env_id: EnvId,
		kind: ResourceKind,
	) -> Result<Vec<DraftSummary>> {
		let rows = sqlx::query_as::<_, SummaryRow>(&format!(
			r#"
			SELECT d.id, d.kind, d.resource_name, d.state,
				(SELECT MAX(v.id) FROM draft_versions v WHERE v.draft_id = d.id) AS latest_version_id,
				d.updated_by, d.updated_on
			FROM drafts d
			WHERE d.app_id = ? AND d.env_id = ? AND d.kind = ? AND d.state IN {PENDING_STATES}
			ORDER BY d.id
			"#
		))
		.bind(app_id.0)
		.bind(env_id.0)
		.bind(kind.as_i32())
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self), fields(draft_id = %draft_id))]
	async fn list_versions(&self, draft_id: DraftId) -> Result<Vec<VersionMetadata>> {
		let rows = sqlx::query_as::<_, VersionMetadataRow>(
			r#"
			SELECT id, action, user_id, created_on
			FROM draft_versions
			WHERE draft_id = ?
			ORDER BY id DESC
			"#,
		)
		.bind(draft_id.0)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self), fields(draft_id = %draft_id))]
	async fn list_comments(&self, draft_id: DraftId) -> Result<Vec<DraftComment>> {
		let rows = sqlx::query_as::<_, CommentRow>(
			r#"
			SELECT id, draft_id, version_id, text, user_id, active, created_on, updated_on
			FROM draft_comments
			WHERE draft_id = ? AND active = 1
			ORDER BY id DESC
			"#,
		)
		.bind(draft_id.0)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self), fields(draft_id = %draft_id, comment_id = %comment_id))]
	async fn get_comment(
		&self,
		draft_id: DraftId,
		comment_id: CommentId,
	) -> Result<Option<DraftComment>> {
		let row = sqlx::query_as::<_, CommentRow>(
			r#"
			SELECT id, draft_id, version_id, text, user_id, active, created_on, updated_on
			FROM draft_comments
			WHERE id = ? AND draft_id = ? AND active = 1
			"#,
		)
		.bind(comment_id.0)
		.bind(draft_id.0)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(draft_id = %draft_id))]
	async fn count_active_comments(&self, draft_id: DraftId) -> Result<u64> {
		let count: i64 = sqlx::query_scalar(
			"SELECT COUNT(*) FROM draft_comments WHERE draft_id = ? AND active = 1",
		)
		.bind(draft_id.0)
		.fetch_one(&self.pool)
		.await?;
		Ok(count.max(0) as u64)
	}

	#[instrument(skip(self, env_ids), fields(app_id = %app_id, envs = env_ids.len()))]
	async fn count_drafts(&self, app_id: AppId, env_ids: &[EnvId]) -> Result<BTreeMap<EnvId, u64>> {
		let rows: Vec<(i32, i64)> = sqlx::query_as(&format!(
			r#"
			SELECT env_id, COUNT(*)
			FROM drafts
			WHERE app_id = ? AND state IN {PENDING_STATES}
			GROUP BY env_id
			"#
		))
		.bind(app_id.0)
		.fetch_all(&self.pool)
		.await?;

		let mut counts: BTreeMap<EnvId, u64> = env_ids.iter().map(|env| (*env, 0)).collect();
		for (env_id, count) in rows {
			if let Some(slot) = counts.get_mut(&EnvId(env_id)) {
				*slot = count.max(0) as u64;
			}
		}
		Ok(counts)
	}

	#[instrument(skip(self), fields(draft_id = %draft_id, from = %expected_from, to = %to))]
	async fn transition_state(
		&self,
		draft_id: DraftId,
		expected_from: DraftState,
		to: DraftState,
		user_id: UserId,
		at_version: Option<DraftVersionId>,
	) -> Result<()> {
		let now = now_rfc3339();
		let mut tx = begin_immediate(&self.pool).await?;

		if let Some(expected_version) = at_version {
			let latest = latest_version_id(&mut tx, draft_id).await?;
			match latest {
				None => return Err(DraftError::NotFound(format!("draft {draft_id}"))),
				Some(latest) if latest != expected_version => {
					return Err(DraftError::StaleBase { latest });
				}
				Some(_) => {}
			}
		}

		let result = sqlx::query(
			"UPDATE drafts SET state = ?, updated_by = ?, updated_on = ? WHERE id = ? AND state = ?",
		)
		.bind(to.as_i32())
		.bind(user_id.0)
		.bind(&now)
		.bind(draft_id.0)
		.bind(expected_from.as_i32())
		.execute(&mut *tx)
		.await?;

		if result.rows_affected() == 0 {
			return match fetch_draft(&mut tx, draft_id).await? {
				None => Err(DraftError::NotFound(format!("draft {draft_id}"))),
				Some(_) => Err(DraftError::ConflictingState {
					draft_id,
					expected: expected_from,
				}),
			};
		}

		record_transition(&mut tx, draft_id, Some(expected_from), to, user_id, &now).await?;
		tx.commit().await?;

		info!(user_id = %user_id, "draft state changed");
		Ok(())
	}

	#[instrument(skip(self), fields(draft_id = %draft_id, comment_id = %comment_id))]
	async fn deactivate_comment(
		&self,
		draft_id: DraftId,
		comment_id: CommentId,
		user_id: UserId,
	) -> Result<bool> {
		let result = sqlx::query(
			r#"
			UPDATE draft_comments
			SET active = 0, updated_on = ?
			WHERE id = ? AND draft_id = ? AND user_id = ? AND active = 1
			"#,
		)
		.bind(now_rfc3339())
		.bind(comment_id.0)
		.bind(draft_id.0)
		.bind(user_id.0)
		.execute(&self.pool)
		.await?;
		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self), fields(app_id = %app_id, env_id = %env_id))]
	async fn discard_pending(
		&self,
		app_id: AppId,
		env_id: EnvId,
		user_id: UserId,
	) -> Result<Vec<DraftId>> {
		let now = now_rfc3339();
		let mut tx = begin_immediate(&self.pool).await?;

		let ids: Vec<i64> = sqlx::query_scalar(
			"SELECT id FROM drafts WHERE app_id = ? AND env_id = ? AND state = ? ORDER BY id",
		)
		.bind(app_id.0)
		.bind(env_id.0)
		.bind(DraftState::Init.as_i32())
		.fetch_all(&mut *tx)
		.await?;

		for id in &ids {
			sqlx::query(
				"UPDATE drafts SET state = ?, updated_by = ?, updated_on = ? WHERE id = ? AND state = ?",
			)
			.bind(DraftState::Discarded.as_i32())
			.bind(user_id.0)
			.bind(&now)
			.bind(*id)
			.bind(DraftState::Init.as_i32())
			.execute(&mut *tx)
			.await?;
			record_transition(
				&mut tx,
				DraftId(*id),
				Some(DraftState::Init),
				DraftState::Discarded,
				user_id,
				&now,
			)
			.await?;
		}

		tx.commit().await?;

		if !ids.is_empty() {
			info!(discarded = ids.len(), "pending drafts discarded");
		}
		Ok(ids.into_iter().map(DraftId).collect())
	}

	#[instrument(skip(self), fields(draft_id = %draft_id))]
	async fn list_state_history(&self, draft_id: DraftId) -> Result<Vec<StateChange>> {
		let rows = sqlx::query_as::<_, StateHistoryRow>(
			r#"
			SELECT draft_id, from_state, to_state, user_id, created_on
			FROM draft_state_history
			WHERE draft_id = ?
			ORDER BY id ASC
			"#,
		)
		.bind(draft_id.0)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use keel_drafts_core::DraftAction;
	use keel_server_db::testing::create_test_pool;

	async fn store() -> SqliteDraftStore {
		SqliteDraftStore::new(create_test_pool().await)
	}

	fn new_draft(name: &str) -> NewDraft {
		NewDraft {
			app_id: AppId(42),
			env_id: EnvId(7),
			kind: ResourceKind::ConfigMap,
			resource_name: name.to_string(),
			action: DraftAction::Add,
			payload: r#"{"k":"v"}"#.to_string(),
			user_id: UserId(10),
			comment: Some("first cut".to_string()),
		}
	}

	fn new_version(created: &CreatedDraft, base: DraftVersionId, user: i32) -> NewVersion {
		NewVersion {
			draft_id: created.draft_id,
			base_version_id: base,
			payload: r#"{"k":"v2"}"#.to_string(),
			action: DraftAction::Update,
			user_id: UserId(user),
			comment: None,
		}
	}

	#[tokio::test]
	async fn create_then_get_round_trips() {
		let store = store().await;
		let created = store.create_draft(&new_draft("cm1")).await.unwrap();
		assert_eq!(created.state, DraftState::Init);

		let detail = store.get_draft(created.draft_id).await.unwrap().unwrap();
		assert_eq!(detail.draft.app_id, AppId(42));
		assert_eq!(detail.draft.env_id, EnvId(7));
		assert_eq!(detail.draft.kind, ResourceKind::ConfigMap);
		assert_eq!(detail.draft.resource_name, "cm1");
		assert_eq!(detail.latest.id, created.version_id);
		assert_eq!(detail.latest.payload, r#"{"k":"v"}"#);
		assert_eq!(detail.latest.action, DraftAction::Add);
		assert!(detail.is_contributor(UserId(10)));
		assert_eq!(store.count_active_comments(created.draft_id).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn missing_draft_reads_as_none() {
		let store = store().await;
		assert!(store.get_draft(DraftId(999)).await.unwrap().is_none());
		assert!(store.list_versions(DraftId(999)).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn second_pending_draft_for_target_is_duplicate() {
		let store = store().await;
		store.create_draft(&new_draft("cm1")).await.unwrap();
		let err = store.create_draft(&new_draft("cm1")).await.unwrap_err();
		assert!(matches!(err, DraftError::DuplicateDraft(_)));
	}

	#[tokio::test]
	async fn terminal_draft_frees_the_target() {
		let store = store().await;
		let first = store.create_draft(&new_draft("cm1")).await.unwrap();
		store
			.transition_state(first.draft_id, DraftState::Init, DraftState::Discarded, UserId(10), None)
			.await
			.unwrap();
		assert!(store.create_draft(&new_draft("cm1")).await.is_ok());
	}

	#[tokio::test]
	async fn append_requires_latest_base() {
		let store = store().await;
		let created = store.create_draft(&new_draft("cm1")).await.unwrap();
		let v2 = store
			.append_version(&new_version(&created, created.version_id, 11))
			.await
			.unwrap();
		assert!(v2.version_id > created.version_id);
		assert!(!v2.reverted_to_init);

		let err = store
			.append_version(&new_version(&created, created.version_id, 11))
			.await
			.unwrap_err();
		match err {
			DraftError::StaleBase { latest } => assert_eq!(latest, v2.version_id),
			other => panic!("expected StaleBase, got {other:?}"),
		}

		let detail = store.get_draft(created.draft_id).await.unwrap().unwrap();
		assert_eq!(detail.latest.id, v2.version_id);
		assert_eq!(detail.contributors.len(), 2);
	}

	#[tokio::test]
	async fn append_reverts_await_approval() {
		let store = store().await;
		let created = store.create_draft(&new_draft("cm1")).await.unwrap();
		store
			.transition_state(
				created.draft_id,
				DraftState::Init,
				DraftState::AwaitApproval,
				UserId(10),
				Some(created.version_id),
			)
			.await
			.unwrap();

		let appended = store
			.append_version(&new_version(&created, created.version_id, 10))
			.await
			.unwrap();
		assert!(appended.reverted_to_init);

		let detail = store.get_draft(created.draft_id).await.unwrap().unwrap();
		assert_eq!(detail.draft.state, DraftState::Init);

		let history = store.list_state_history(created.draft_id).await.unwrap();
		let states: Vec<_> = history.iter().map(|h| (h.from, h.to)).collect();
		assert_eq!(
			states,
			vec![
				(None, DraftState::Init),
				(Some(DraftState::Init), DraftState::AwaitApproval),
				(Some(DraftState::AwaitApproval), DraftState::Init),
			]
		);
	}

	#[tokio::test]
	async fn append_to_terminal_draft_is_illegal() {
		let store = store().await;
		let created = store.create_draft(&new_draft("cm1")).await.unwrap();
		store
			.transition_state(created.draft_id, DraftState::Init, DraftState::Discarded, UserId(10), None)
			.await
			.unwrap();
		let err = store
			.append_version(&new_version(&created, created.version_id, 10))
			.await
			.unwrap_err();
		assert!(matches!(err, DraftError::IllegalTransition { .. }));
	}

	#[tokio::test]
	async fn transition_is_compare_and_set() {
		let store = store().await;
		let created = store.create_draft(&new_draft("cm1")).await.unwrap();
		store
			.transition_state(created.draft_id, DraftState::Init, DraftState::AwaitApproval, UserId(10), None)
			.await
			.unwrap();
		let err = store
			.transition_state(created.draft_id, DraftState::Init, DraftState::Discarded, UserId(10), None)
			.await
			.unwrap_err();
		assert!(matches!(err, DraftError::ConflictingState { .. }));

		let err = store
			.transition_state(DraftId(404), DraftState::Init, DraftState::Discarded, UserId(10), None)
			.await
			.unwrap_err();
		assert!(matches!(err, DraftError::NotFound(_)));
	}

	#[tokio::test]
	async fn transition_at_version_detects_stale_approval() {
		let store = store().await;
		let created = store.create_draft(&new_draft("cm1")).await.unwrap();
		let v2 = store
			.append_version(&new_version(&created, created.version_id, 10))
			.await
			.unwrap();
		let err = store
			.transition_state(
				created.draft_id,
				DraftState::Init,
				DraftState::AwaitApproval,
				UserId(10),
				Some(created.version_id),
			)
			.await
			.unwrap_err();
		match err {
			DraftError::StaleBase { latest } => assert_eq!(latest, v2.version_id),
			other => panic!("expected StaleBase, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn comments_are_soft_deleted_by_author_only() {
		let store = store().await;
		let created = store.create_draft(&new_draft("cm1")).await.unwrap();
		let comment_id = store
			.add_comment(&NewComment {
				draft_id: created.draft_id,
				version_id: created.version_id,
				text: "looks good".to_string(),
				user_id: UserId(11),
			})
			.await
			.unwrap();

		let comments = store.list_comments(created.draft_id).await.unwrap();
		assert_eq!(comments.len(), 2);
		assert_eq!(comments[0].id, comment_id);

		assert!(!store
			.deactivate_comment(created.draft_id, comment_id, UserId(10))
			.await
			.unwrap());
		assert!(store
			.deactivate_comment(created.draft_id, comment_id, UserId(11))
			.await
			.unwrap());
		assert!(store
			.get_comment(created.draft_id, comment_id)
			.await
			.unwrap()
			.is_none());
		assert_eq!(store.count_active_comments(created.draft_id).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn comment_on_foreign_version_is_not_found() {
		let store = store().await;
		let a = store.create_draft(&new_draft("a")).await.unwrap();
		let b = store.create_draft(&new_draft("b")).await.unwrap();
		let err = store
			.add_comment(&NewComment {
				draft_id: a.draft_id,
				version_id: b.version_id,
				text: "wrong draft".to_string(),
				user_id: UserId(10),
			})
			.await
			.unwrap_err();
		assert!(matches!(err, DraftError::NotFound(_)));
	}

	#[tokio::test]
	async fn counts_are_zero_filled() {
		let store = store().await;
		store.create_draft(&new_draft("a")).await.unwrap();
		store.create_draft(&new_draft("b")).await.unwrap();
		let counts = store
			.count_drafts(AppId(42), &[EnvId(7), EnvId(8), EnvId::BASE])
			.await
			.unwrap();
		assert_eq!(counts[&EnvId(7)], 2);
		assert_eq!(counts[&EnvId(8)], 0);
		assert_eq!(counts[&EnvId::BASE], 0);
	}

	#[tokio::test]
	async fn discard_pending_only_touches_init_drafts() {
		let store = store().await;
		let a = store.create_draft(&new_draft("a")).await.unwrap();
		let b = store.create_draft(&new_draft("b")).await.unwrap();
		let c = store.create_draft(&new_draft("c")).await.unwrap();
		store
			.transition_state(c.draft_id, DraftState::Init, DraftState::AwaitApproval, UserId(10), None)
			.await
			.unwrap();

		let discarded = store
			.discard_pending(AppId(42), EnvId(7), UserId(1))
			.await
			.unwrap();
		assert_eq!(discarded, vec![a.draft_id, b.draft_id]);

		let a = store.get_draft(a.draft_id).await.unwrap().unwrap();
		assert_eq!(a.draft.state, DraftState::Discarded);
		assert_eq!(a.draft.updated_by, UserId(1));
		let c = store.get_draft(c.draft_id).await.unwrap().unwrap();
		assert_eq!(c.draft.state, DraftState::AwaitApproval);
	}

	#[tokio::test]
	async fn list_and_lookup_by_name() {
		let store = store().await;
		let created = store.create_draft(&new_draft("cm1")).await.unwrap();
		let summaries = store
			.list_drafts(AppId(42), EnvId(7), ResourceKind::ConfigMap)
			.await
			.unwrap();
		assert_eq!(summaries.len(), 1);
		assert_eq!(summaries[0].latest_version_id, created.version_id);

		let found = store
			.get_draft_by_name(AppId(42), EnvId(7), ResourceKind::ConfigMap, "cm1")
			.await
			.unwrap();
		assert_eq!(found.unwrap().draft.id, created.draft_id);
		assert!(store
			.get_draft_by_name(AppId(42), EnvId(7), ResourceKind::Secret, "cm1")
			.await
			.unwrap()
			.is_none());
	}

	#[tokio::test]
	async fn versions_are_listed_newest_first() {
		let store = store().await;
		let created = store.create_draft(&new_draft("cm1")).await.unwrap();
		let v2 = store
			.append_version(&new_version(&created, created.version_id, 11))
			.await
			.unwrap();
		let versions = store.list_versions(created.draft_id).await.unwrap();
		let ids: Vec<_> = versions.iter().map(|v| v.version_id).collect();
		assert_eq!(ids, vec![v2.version_id, created.version_id]);
	}
}
