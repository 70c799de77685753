// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AppId, EnvId, UserId};
use crate::types::ProtectionState;

/// Current protection state of an (app, env).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionEntry {
	pub app_id: AppId,
	pub env_id: EnvId,
	pub state: ProtectionState,
	pub created_by: UserId,
	pub created_on: DateTime<Utc>,
	pub updated_by: UserId,
	pub updated_on: DateTime<Utc>,
}

/// One row of the append-only protection log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionHistoryEntry {
	pub id: i64,
	pub app_id: AppId,
	pub env_id: EnvId,
	pub state: ProtectionState,
	pub updated_by: UserId,
	pub updated_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionChanged {
	pub app_id: AppId,
	pub env_id: EnvId,
	pub new_state: ProtectionState,
	pub user_id: UserId,
}

/// Events delivered on the in-process listener bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtectionEvent {
	Changed(ProtectionChanged),
}

impl ProtectionEvent {
	pub fn event_type(&self) -> &'static str {
		match self {
			ProtectionEvent::Changed(_) => "protection_changed",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn event_serializes_with_tag() {
		let event = ProtectionEvent::Changed(ProtectionChanged {
			app_id: AppId(42),
			env_id: EnvId(7),
			new_state: ProtectionState::Disabled,
			user_id: UserId(3),
		});
		let json = serde_json::to_value(event).unwrap();
		assert_eq!(json["type"], "changed");
		assert_eq!(json["new_state"], 2);
		assert_eq!(event.event_type(), "protection_changed");
	}
}
