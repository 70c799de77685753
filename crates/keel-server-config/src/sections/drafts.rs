// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Draft workflow configuration section.

use serde::Deserialize;

const DEFAULT_SYSTEM_USER_ID: i32 = 1;
const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REDACTION_SENTINEL: &str = "********";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DraftsConfigLayer {
	/// User recorded on drafts discarded when protection is turned off.
	pub system_user_id: Option<i32>,
	/// Deadline applied when a caller does not supply one.
	pub operation_timeout_secs: Option<u64>,
	pub redaction_sentinel: Option<String>,
}

impl DraftsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.system_user_id.is_some() {
			self.system_user_id = other.system_user_id;
		}
		if other.operation_timeout_secs.is_some() {
			self.operation_timeout_secs = other.operation_timeout_secs;
		}
		if other.redaction_sentinel.is_some() {
			self.redaction_sentinel = other.redaction_sentinel;
		}
	}

	pub fn finalize(self) -> DraftsConfig {
		DraftsConfig {
			system_user_id: self.system_user_id.unwrap_or(DEFAULT_SYSTEM_USER_ID),
			operation_timeout_secs: self
				.operation_timeout_secs
				.unwrap_or(DEFAULT_OPERATION_TIMEOUT_SECS),
			redaction_sentinel: self
				.redaction_sentinel
				.unwrap_or_else(|| DEFAULT_REDACTION_SENTINEL.to_string()),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftsConfig {
	pub system_user_id: i32,
	pub operation_timeout_secs: u64,
	pub redaction_sentinel: String,
}

impl Default for DraftsConfig {
	fn default() -> Self {
		DraftsConfigLayer::default().finalize()
	}
}

impl DraftsConfig {
	pub fn validate(&self) -> Result<(), String> {
		if self.system_user_id <= 0 {
			return Err("drafts.system_user_id must be positive".to_string());
		}
		if self.operation_timeout_secs == 0 {
			return Err("drafts.operation_timeout_secs must be greater than zero".to_string());
		}
		if self.redaction_sentinel.is_empty() {
			return Err("drafts.redaction_sentinel must not be empty".to_string());
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = DraftsConfig::default();
		assert_eq!(config.system_user_id, 1);
		assert_eq!(config.operation_timeout_secs, 30);
		assert_eq!(config.redaction_sentinel, "********");
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_validate_rejects_zero_timeout() {
		let config = DraftsConfigLayer {
			operation_timeout_secs: Some(0),
			..Default::default()
		}
		.finalize();
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_validate_rejects_non_positive_user() {
		let config = DraftsConfigLayer {
			system_user_id: Some(-1),
			..Default::default()
		}
		.finalize();
		assert!(config.validate().is_err());
	}
}
