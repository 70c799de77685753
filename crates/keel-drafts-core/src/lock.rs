// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A configured lock: when `expression` holds for a draft's environment, the
/// payload keys at `locked_keys` must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRule {
	pub expression: String,
	pub locked_keys: Vec<String>,
}

/// Outcome of checking a draft against the lock rules. Never mutates anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockValidation {
	pub is_locked: bool,
	pub locked_keys: Vec<String>,
	pub applicable_rules: usize,
}

impl LockValidation {
	pub fn unlocked() -> Self {
		Self::default()
	}
}

/// Resolves a dotted key path such as `$.spec.replicas` or `env.LOG_LEVEL`.
///
/// Numeric segments index into arrays.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
	let path = path.strip_prefix("$.").unwrap_or(path);
	let path = path.strip_prefix('$').unwrap_or(path);
	if path.is_empty() {
		return Some(value);
	}
	path.split('.').try_fold(value, |current, segment| match current {
		Value::Object(map) => map.get(segment),
		Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
		_ => None,
	})
}
