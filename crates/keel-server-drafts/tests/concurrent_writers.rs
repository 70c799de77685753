// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Races against a file-backed, multi-connection pool.

use std::sync::Arc;

use keel_drafts_core::{
	AppId, DraftAction, DraftState, EnvId, NewDraft, NewVersion, ResourceKind, UserId,
};
use keel_server_db::{create_pool, run_migrations};
use keel_server_drafts::{DraftError, DraftStore, SqliteDraftStore};
use tempfile::TempDir;

const WRITERS: usize = 16;

async fn file_store() -> (TempDir, Arc<SqliteDraftStore>) {
	let dir = tempfile::tempdir().unwrap();
	let url = format!("sqlite:{}", dir.path().join("drafts.db").display());
	let pool = create_pool(&url).await.unwrap();
	run_migrations(&pool).await.unwrap();
	(dir, Arc::new(SqliteDraftStore::new(pool)))
}

fn new_draft() -> NewDraft {
	NewDraft {
		app_id: AppId(42),
		env_id: EnvId(7),
		kind: ResourceKind::ConfigMap,
		resource_name: "cm1".to_string(),
		action: DraftAction::Add,
		payload: r#"{"k":"v"}"#.to_string(),
		user_id: UserId(10),
		comment: None,
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_appends_on_one_base_yield_one_winner() {
	let (_dir, store) = file_store().await;
	let created = store.create_draft(&new_draft()).await.unwrap();

	let mut tasks = Vec::new();
	for writer in 0..WRITERS {
		let store = Arc::clone(&store);
		let new = NewVersion {
			draft_id: created.draft_id,
			base_version_id: created.version_id,
			payload: format!(r#"{{"k":"v{writer}"}}"#),
			action: DraftAction::Update,
			user_id: UserId(100 + writer as i32),
			comment: None,
		};
		tasks.push(tokio::spawn(async move { store.append_version(&new).await }));
	}

	let mut winners = Vec::new();
	for task in tasks {
		match task.await.unwrap() {
			Ok(appended) => winners.push(appended.version_id),
			Err(DraftError::StaleBase { latest }) => assert_ne!(latest, created.version_id),
			Err(other) => panic!("unexpected error from racing append: {other:?}"),
		}
	}
	assert_eq!(winners.len(), 1);

	let versions = store.list_versions(created.draft_id).await.unwrap();
	assert_eq!(versions.len(), 2);
	assert_eq!(versions[0].version_id, winners[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_transitions_from_one_state_yield_one_winner() {
	let (_dir, store) = file_store().await;
	let created = store.create_draft(&new_draft()).await.unwrap();
	store
		.transition_state(
			created.draft_id,
			DraftState::Init,
			DraftState::AwaitApproval,
			UserId(10),
			None,
		)
		.await
		.unwrap();

	let mut tasks = Vec::new();
	for approver in 0..WRITERS {
		let store = Arc::clone(&store);
		let draft_id = created.draft_id;
		let version_id = created.version_id;
		tasks.push(tokio::spawn(async move {
			store
				.transition_state(
					draft_id,
					DraftState::AwaitApproval,
					DraftState::Published,
					UserId(200 + approver as i32),
					Some(version_id),
				)
				.await
		}));
	}

	let mut published = 0;
	for task in tasks {
		match task.await.unwrap() {
			Ok(()) => published += 1,
			Err(DraftError::ConflictingState { expected, .. }) => {
				assert_eq!(expected, DraftState::AwaitApproval)
			}
			Err(other) => panic!("unexpected error from racing transition: {other:?}"),
		}
	}
	assert_eq!(published, 1);

	let history = store.list_state_history(created.draft_id).await.unwrap();
	let to_published = history
		.iter()
		.filter(|change| change.to == DraftState::Published)
		.count();
	assert_eq!(to_published, 1);
}
