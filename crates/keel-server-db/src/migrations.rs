// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const MIGRATIONS: &[(&str, &str)] = &[
	("001_drafts", include_str!("../migrations/001_drafts.sql")),
	(
		"002_resource_protection",
		include_str!("../migrations/002_resource_protection.sql"),
	),
];

/// Run all schema migrations.
///
/// Every statement is `IF NOT EXISTS`, so running this against an already
/// migrated database is a no-op.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	for (name, sql) in MIGRATIONS {
		for stmt in sql.split(';').filter(|s| !s.trim().is_empty()) {
			sqlx::query(stmt).execute(pool).await?;
		}
		tracing::debug!(migration = name, "migration applied");
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	#[tokio::test]
	async fn test_migrations_are_idempotent() {
		let pool = create_test_pool().await;
		run_migrations(&pool).await.unwrap();

		let tables: Vec<(String,)> =
			sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
				.fetch_all(&pool)
				.await
				.unwrap();
		let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
		for table in [
			"draft_comments",
			"draft_state_history",
			"draft_versions",
			"drafts",
			"resource_protection",
			"resource_protection_history",
		] {
			assert!(names.contains(&table), "missing table {table}");
		}
	}

	#[tokio::test]
	async fn test_pending_target_is_unique() {
		let pool = create_test_pool().await;
		let insert = "INSERT INTO drafts (app_id, env_id, kind, resource_name, state, created_by, created_on, updated_by, updated_on) VALUES (1, 2, 0, 'cm', ?, 1, 'now', 1, 'now')";

		sqlx::query(insert).bind(0).execute(&pool).await.unwrap();
		let err = sqlx::query(insert)
			.bind(3)
			.execute(&pool)
			.await
			.unwrap_err();
		assert!(matches!(err, sqlx::Error::Database(db) if db.is_unique_violation()));

		// Terminal drafts do not occupy the target.
		sqlx::query(insert).bind(2).execute(&pool).await.unwrap();
		sqlx::query(insert).bind(1).execute(&pool).await.unwrap();
	}
}
