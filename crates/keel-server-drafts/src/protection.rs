// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource protection: the per (app, env) switch that routes configuration
//! changes through drafts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use keel_drafts_core::{
	AppId, EnvId, ProtectionChanged, ProtectionEntry, ProtectionEvent, ProtectionHistoryEntry,
	ProtectionState, UserId,
};
use keel_server_db::begin_immediate;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::deadline::run_until;
use crate::error::Result;
use crate::listener::ListenerBus;
use crate::rows::{now_rfc3339, ProtectionHistoryRow, ProtectionRow};

/// Protection is tracked for configuration as a whole, not per resource kind.
const CONFIGURATION_RESOURCE: i32 = 0;

#[async_trait]
pub trait ProtectionStore: Send + Sync {
	/// Writes the current state and, when it changed, a history row. Returns
	/// the previous state if an entry existed.
	async fn upsert(
		&self,
		app_id: AppId,
		env_id: EnvId,
		state: ProtectionState,
		user_id: UserId,
	) -> Result<Option<ProtectionState>>;

	async fn get(&self, app_id: AppId, env_id: EnvId) -> Result<Option<ProtectionEntry>>;

	async fn list_for_app(&self, app_id: AppId) -> Result<Vec<ProtectionEntry>>;

	/// Newest first.
	async fn history(&self, app_id: AppId, env_id: EnvId) -> Result<Vec<ProtectionHistoryEntry>>;
}

#[derive(Clone)]
pub struct SqliteProtectionRepository {
	pool: SqlitePool,
}

impl SqliteProtectionRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl ProtectionStore for SqliteProtectionRepository {
	#[instrument(skip(self), fields(app_id = %app_id, env_id = %env_id, state = %state))]
	async fn upsert(
		&self,
		app_id: AppId,
		env_id: EnvId,
		state: ProtectionState,
		user_id: UserId,
	) -> Result<Option<ProtectionState>> {
		let now = now_rfc3339();
		let mut tx = begin_immediate(&self.pool).await?;

		let previous: Option<i32> = sqlx::query_scalar(
			"SELECT state FROM resource_protection WHERE app_id = ? AND env_id = ? AND resource_kind = ?",
		)
		.bind(app_id.0)
		.bind(env_id.0)
		.bind(CONFIGURATION_RESOURCE)
		.fetch_optional(&mut *tx)
		.await?;
		let previous = previous
			.map(ProtectionState::try_from)
			.transpose()
			.map_err(crate::error::DraftError::internal)?;

		sqlx::query(
			r#"
			INSERT INTO resource_protection (app_id, env_id, resource_kind, state, created_by, created_on, updated_by, updated_on)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(app_id, env_id, resource_kind) DO UPDATE SET
				state = excluded.state,
				updated_by = excluded.updated_by,
				updated_on = excluded.updated_on
			"#,
		)
		.bind(app_id.0)
		.bind(env_id.0)
		.bind(CONFIGURATION_RESOURCE)
		.bind(state.as_i32())
		.bind(user_id.0)
		.bind(&now)
		.bind(user_id.0)
		.bind(&now)
		.execute(&mut *tx)
		.await?;

		if previous != Some(state) {
			sqlx::query(
				r#"
				INSERT INTO resource_protection_history (app_id, env_id, resource_kind, state, updated_by, updated_on)
				VALUES (?, ?, ?, ?, ?, ?)
				"#,
			)
			.bind(app_id.0)
			.bind(env_id.0)
			.bind(CONFIGURATION_RESOURCE)
			.bind(state.as_i32())
			.bind(user_id.0)
			.bind(&now)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;
		Ok(previous)
	}

	#[instrument(skip(self), fields(app_id = %app_id, env_id = %env_id))]
	async fn get(&self, app_id: AppId, env_id: EnvId) -> Result<Option<ProtectionEntry>> {
		let row = sqlx::query_as::<_, ProtectionRow>(
			r#"
			SELECT app_id, env_id, state, created_by, created_on, updated_by, updated_on
			FROM resource_protection
			WHERE app_id = ? AND env_id = ? AND resource_kind = ?
			"#,
		)
		.bind(app_id.0)
		.bind(env_id.0)
		.bind(CONFIGURATION_RESOURCE)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(app_id = %app_id))]
	async fn list_for_app(&self, app_id: AppId) -> Result<Vec<ProtectionEntry>> {
		let rows = sqlx::query_as::<_, ProtectionRow>(
			r#"
			SELECT app_id, env_id, state, created_by, created_on, updated_by, updated_on
			FROM resource_protection
			WHERE app_id = ? AND resource_kind = ?
			ORDER BY env_id
			"#,
		)
		.bind(app_id.0)
		.bind(CONFIGURATION_RESOURCE)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self), fields(app_id = %app_id, env_id = %env_id))]
	async fn history(&self, app_id: AppId, env_id: EnvId) -> Result<Vec<ProtectionHistoryEntry>> {
		let rows = sqlx::query_as::<_, ProtectionHistoryRow>(
			r#"
			SELECT id, app_id, env_id, state, updated_by, updated_on
			FROM resource_protection_history
			WHERE app_id = ? AND env_id = ? AND resource_kind = ?
			ORDER BY id DESC
			"#,
		)
		.bind(app_id.0)
		.bind(env_id.0)
		.bind(CONFIGURATION_RESOURCE)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}
}

/// Current protection per (app, env), with change notification.
///
/// Writes are serialized so listeners observe changes in commit order.
pub struct ProtectionRegistry {
	store: Arc<dyn ProtectionStore>,
	bus: Arc<ListenerBus>,
	write_lock: Mutex<()>,
	timeout: Duration,
}

impl ProtectionRegistry {
	pub fn new(store: Arc<dyn ProtectionStore>, bus: Arc<ListenerBus>, timeout: Duration) -> Self {
		Self {
			store,
			bus,
			write_lock: Mutex::new(()),
			timeout,
		}
	}

	pub fn bus(&self) -> &Arc<ListenerBus> {
		&self.bus
	}

	/// Sets the protection state and, after commit, notifies listeners.
	///
	/// The deadline bounds waiting for the writer lock and the write. Once
	/// committed the change is delivered to every listener before this returns.
	#[instrument(skip(self, deadline), fields(app_id = %app_id, env_id = %env_id, state = %state))]
	pub async fn set_protection(
		&self,
		app_id: AppId,
		env_id: EnvId,
		state: ProtectionState,
		user_id: UserId,
		deadline: Option<Instant>,
	) -> Result<()> {
		let (_guard, previous) = run_until(deadline, self.timeout, "set_protection", async {
			let guard = self.write_lock.lock().await;
			let previous = self.store.upsert(app_id, env_id, state, user_id).await?;
			Ok((guard, previous))
		})
		.await?;

		if previous == Some(state) {
			return Ok(());
		}

		info!(previous = ?previous, user_id = %user_id, "protection changed");
		let event = ProtectionEvent::Changed(ProtectionChanged {
			app_id,
			env_id,
			new_state: state,
			user_id,
		});
		self.bus.publish(&event).await;
		Ok(())
	}

	/// Disabled when no entry exists.
	pub async fn get_protection(
		&self,
		app_id: AppId,
		env_id: EnvId,
		deadline: Option<Instant>,
	) -> Result<ProtectionState> {
		let entry = run_until(
			deadline,
			self.timeout,
			"get_protection",
			self.store.get(app_id, env_id),
		)
		.await?;
		Ok(entry.map_or(ProtectionState::Disabled, |e| e.state))
	}

	pub async fn is_enabled(
		&self,
		app_id: AppId,
		env_id: EnvId,
		deadline: Option<Instant>,
	) -> Result<bool> {
		Ok(self.get_protection(app_id, env_id, deadline).await? == ProtectionState::Enabled)
	}

	pub async fn list_for_app(
		&self,
		app_id: AppId,
		deadline: Option<Instant>,
	) -> Result<Vec<ProtectionEntry>> {
		run_until(
			deadline,
			self.timeout,
			"list_protection",
			self.store.list_for_app(app_id),
		)
		.await
	}

	pub async fn list_history(
		&self,
		app_id: AppId,
		env_id: EnvId,
		deadline: Option<Instant>,
	) -> Result<Vec<ProtectionHistoryEntry>> {
		run_until(
			deadline,
			self.timeout,
			"protection_history",
			self.store.history(app_id, env_id),
		)
		.await
	}
}
