// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Enumerations persisted as integers.
//!
//! Every value is pinned explicitly; reordering variants must never change
//! what is stored in the database or sent over the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

macro_rules! numeric_enum {
	($name:ident, $label:literal { $($variant:ident = $value:literal => $text:literal),+ $(,)? }) => {
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(into = "i32", try_from = "i32")]
		pub enum $name {
			$($variant = $value),+
		}

		impl $name {
			pub fn as_i32(self) -> i32 {
				self as i32
			}

			pub fn all() -> &'static [$name] {
				&[$($name::$variant),+]
			}
		}

		impl TryFrom<i32> for $name {
			type Error = CoreError;

			fn try_from(value: i32) -> Result<Self, Self::Error> {
				match value {
					$($value => Ok($name::$variant),)+
					other => Err(CoreError::InvalidEncoding { kind: $label, value: other }),
				}
			}
		}

		impl From<$name> for i32 {
			fn from(value: $name) -> i32 {
				value.as_i32()
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				let s = match self {
					$($name::$variant => $text),+
				};
				write!(f, "{s}")
			}
		}
	};
}

numeric_enum!(DraftState, "draft state" {
	Init = 0 => "init",
	Discarded = 1 => "discarded",
	Published = 2 => "published",
	AwaitApproval = 3 => "await_approval",
});

numeric_enum!(ResourceKind, "resource kind" {
	ConfigMap = 0 => "configmap",
	Secret = 1 => "secret",
	DeploymentTemplate = 2 => "deployment-template",
});

numeric_enum!(DraftAction, "draft action" {
	Add = 0 => "add",
	Update = 1 => "update",
	Delete = 2 => "delete",
});

numeric_enum!(ProtectionState, "protection state" {
	Enabled = 1 => "enabled",
	Disabled = 2 => "disabled",
});

impl DraftState {
	/// Published and Discarded drafts accept no further mutation.
	pub fn is_terminal(self) -> bool {
		matches!(self, DraftState::Published | DraftState::Discarded)
	}

	pub fn is_pending(self) -> bool {
		!self.is_terminal()
	}

	/// Transitions a caller may request explicitly.
	///
	/// The AwaitApproval to Init revert is not listed here; it only happens as
	/// a side effect of appending a version.
	pub fn allows_transition(self, to: DraftState) -> bool {
		matches!(
			(self, to),
			(DraftState::Init, DraftState::AwaitApproval)
				| (DraftState::Init, DraftState::Discarded)
				| (DraftState::AwaitApproval, DraftState::Discarded)
				| (DraftState::AwaitApproval, DraftState::Published)
		)
	}
}

impl ResourceKind {
	/// ConfigMaps and Secrets are addressed by Kubernetes object names.
	pub fn requires_dns_name(self) -> bool {
		matches!(self, ResourceKind::ConfigMap | ResourceKind::Secret)
	}
}

impl std::str::FromStr for ResourceKind {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"configmap" | "cm" => Ok(ResourceKind::ConfigMap),
			"secret" | "cs" => Ok(ResourceKind::Secret),
			"deployment-template" | "deploymenttemplate" | "dt" => {
				Ok(ResourceKind::DeploymentTemplate)
			}
			_ => Err(CoreError::InvalidName {
				kind: "resource kind",
				value: s.to_string(),
			}),
		}
	}
}

impl std::str::FromStr for ProtectionState {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"enabled" | "enable" | "on" => Ok(ProtectionState::Enabled),
			"disabled" | "disable" | "off" => Ok(ProtectionState::Disabled),
			_ => Err(CoreError::InvalidName {
				kind: "protection state",
				value: s.to_string(),
			}),
		}
	}
}
