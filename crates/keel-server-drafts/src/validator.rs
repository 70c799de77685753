// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use keel_drafts_core::{DraftAction, ResourceKind};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidatorError {
	/// The payload itself is wrong.
	#[error("{0}")]
	Rejected(String),

	/// The validator could not reach a verdict.
	#[error("{0}")]
	Unavailable(String),
}

/// Checks a draft payload before it is stored.
#[async_trait]
pub trait ConfigValidator: Send + Sync {
	async fn validate(
		&self,
		kind: ResourceKind,
		action: DraftAction,
		payload: &str,
	) -> Result<(), ValidatorError>;
}

const ENVELOPE_KEY: &str = "configData";

/// Shape checks that need no outside knowledge.
///
/// Every payload must be a JSON object. ConfigMap and Secret payloads may use
/// the `{"id": .., "configData": [..]}` envelope: adds and updates then need at
/// least one entry, deletes need a non-zero `id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayloadValidator;

#[async_trait]
impl ConfigValidator for JsonPayloadValidator {
	async fn validate(
		&self,
		kind: ResourceKind,
		action: DraftAction,
		payload: &str,
	) -> Result<(), ValidatorError> {
		check_payload(kind, action, payload)
	}
}

fn check_payload(kind: ResourceKind, action: DraftAction, payload: &str) -> Result<(), ValidatorError> {
	let value: Value = serde_json::from_str(payload)
		.map_err(|e| ValidatorError::Rejected(format!("payload is not valid JSON: {e}")))?;
	let Value::Object(map) = value else {
		return Err(ValidatorError::Rejected("payload must be a JSON object".to_string()));
	};

	if kind == ResourceKind::DeploymentTemplate {
		return Ok(());
	}
	let Some(envelope) = map.get(ENVELOPE_KEY) else {
		return Ok(());
	};
	let Value::Array(entries) = envelope else {
		return Err(ValidatorError::Rejected(format!("{ENVELOPE_KEY} must be an array")));
	};

	match action {
		DraftAction::Add | DraftAction::Update => {
			if entries.is_empty() {
				return Err(ValidatorError::Rejected(format!(
					"{ENVELOPE_KEY} must contain at least one entry"
				)));
			}
			if entries.iter().any(|entry| !entry.is_object()) {
				return Err(ValidatorError::Rejected(format!(
					"{ENVELOPE_KEY} entries must be objects"
				)));
			}
		}
		DraftAction::Delete => {
			let id = map.get("id").and_then(Value::as_i64).unwrap_or(0);
			if id == 0 {
				return Err(ValidatorError::Rejected("invalid config id".to_string()));
			}
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn check(kind: ResourceKind, action: DraftAction, payload: &str) -> Result<(), ValidatorError> {
		tokio_test::block_on(JsonPayloadValidator.validate(kind, action, payload))
	}

	#[test]
	fn plain_objects_pass() {
		assert!(check(ResourceKind::ConfigMap, DraftAction::Add, r#"{"k":"v"}"#).is_ok());
		assert!(check(ResourceKind::Secret, DraftAction::Add, r#"{"password":"hunter2"}"#).is_ok());
		assert!(check(ResourceKind::DeploymentTemplate, DraftAction::Update, r#"{"replicas":2}"#).is_ok());
	}

	#[test]
	fn non_objects_fail() {
		assert!(check(ResourceKind::ConfigMap, DraftAction::Add, "[1,2]").is_err());
		assert!(check(ResourceKind::ConfigMap, DraftAction::Add, "not json").is_err());
		assert!(check(ResourceKind::DeploymentTemplate, DraftAction::Add, "\"x\"").is_err());
	}

	#[test]
	fn envelope_rules() {
		let entry = r#"{"configData":[{"name":"cm1","data":{"a":"b"}}]}"#;
		assert!(check(ResourceKind::ConfigMap, DraftAction::Update, entry).is_ok());
		assert!(check(ResourceKind::ConfigMap, DraftAction::Add, r#"{"configData":[]}"#).is_err());
		assert!(check(ResourceKind::Secret, DraftAction::Add, r#"{"configData":{}}"#).is_err());
		assert!(check(ResourceKind::Secret, DraftAction::Add, r#"{"configData":[1]}"#).is_err());
	}

	#[test]
	fn delete_needs_config_id() {
		let no_id = r#"{"configData":[{"name":"cm1"}]}"#;
		let with_id = r#"{"id":12,"configData":[{"name":"cm1"}]}"#;
		let zero_id = r#"{"id":0,"configData":[]}"#;
		assert_eq!(
			check(ResourceKind::ConfigMap, DraftAction::Delete, no_id),
			Err(ValidatorError::Rejected("invalid config id".to_string()))
		);
		assert!(check(ResourceKind::ConfigMap, DraftAction::Delete, with_id).is_ok());
		assert!(check(ResourceKind::Secret, DraftAction::Delete, zero_id).is_err());
	}

	proptest! {
		#[test]
		fn arbitrary_text_never_panics(s in "\\PC{0,64}") {
			let _ = check_payload(ResourceKind::Secret, DraftAction::Update, &s);
		}
	}
}
