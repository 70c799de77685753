// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One-way redaction of secret payloads.
//!
//! Secret drafts are shown to readers without approve or admin rights with
//! every value replaced by a fixed sentinel. Keys and nesting are kept so the
//! reader can still see what a draft touches. There is no reveal: privileged
//! readers get the stored payload directly.
//!
//! Two payload shapes are recognised:
//!
//! - the secret envelope, `{"configData": [{"name": .., "data": {..}}]}`, where
//!   only the `data`, `secretData` and `defaultData` members of each entry are
//!   redacted and the entry metadata stays readable. Beside `configData`, only
//!   the identifying keys (`id`, `appId`, `environmentId`, `userId`) are kept;
//!   any other top-level value is redacted;
//! - any other JSON document, where every leaf value is redacted.
//!
//! Anything that is not JSON collapses to the sentinel. Redaction is
//! idempotent.

use serde_json::{Map, Value};

/// Replacement for every redacted value.
pub const SENTINEL: &str = "********";

const ENVELOPE_KEY: &str = "configData";
const SECRET_MEMBERS: &[&str] = &["data", "secretData", "defaultData"];
const ENVELOPE_METADATA: &[&str] = &["id", "appId", "environmentId", "userId"];

#[derive(Debug, Clone)]
pub struct Redactor {
	sentinel: String,
}

impl Default for Redactor {
	fn default() -> Self {
		Self::new(SENTINEL)
	}
}

impl Redactor {
	pub fn new(sentinel: impl Into<String>) -> Self {
		Self {
			sentinel: sentinel.into(),
		}
	}

	pub fn sentinel(&self) -> &str {
		&self.sentinel
	}

	pub fn redact(&self, payload: &str) -> String {
		match serde_json::from_str::<Value>(payload) {
			Ok(mut value) => {
				self.redact_value(&mut value);
				serde_json::to_string(&value).unwrap_or_else(|_| self.sentinel.clone())
			}
			Err(_) => self.sentinel.clone(),
		}
	}

	pub fn redact_value(&self, value: &mut Value) {
		match value {
			Value::Object(map) if is_envelope(map) => self.redact_envelope(map),
			other => self.redact_leaves(other),
		}
	}

	fn redact_envelope(&self, map: &mut Map<String, Value>) {
		for (key, value) in map.iter_mut() {
			if key != ENVELOPE_KEY && !ENVELOPE_METADATA.contains(&key.as_str()) {
				self.redact_leaves(value);
			}
		}

		let Some(Value::Array(entries)) = map.get_mut(ENVELOPE_KEY) else {
			return;
		};
		for entry in entries.iter_mut() {
			match entry {
				Value::Object(fields) => {
					for member in SECRET_MEMBERS {
						if let Some(secret) = fields.get_mut(*member) {
							self.redact_leaves(secret);
						}
					}
				}
				other => self.redact_leaves(other),
			}
		}
	}

	fn redact_leaves(&self, value: &mut Value) {
		match value {
			Value::Object(map) => map.values_mut().for_each(|v| self.redact_leaves(v)),
			Value::Array(items) => items.iter_mut().for_each(|v| self.redact_leaves(v)),
			leaf => *leaf = Value::String(self.sentinel.clone()),
		}
	}
}

fn is_envelope(map: &Map<String, Value>) -> bool {
	matches!(map.get(ENVELOPE_KEY), Some(Value::Array(_)))
}

/// Redacts with the default sentinel.
pub fn redact(payload: &str) -> String {
	Redactor::default().redact(payload)
}
