// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed identifiers.
//!
//! Identifiers are plain integers at the storage boundary. Wrapping them keeps
//! an `AppId` from being passed where an `EnvId` is expected.

use serde::{Deserialize, Serialize};

macro_rules! integer_id {
	($(#[$meta:meta])* $name:ident($inner:ty)) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(pub $inner);

		impl $name {
			pub fn get(self) -> $inner {
				self.0
			}
		}

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl std::str::FromStr for $name {
			type Err = std::num::ParseIntError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Ok(Self(s.parse()?))
			}
		}

		impl From<$inner> for $name {
			fn from(value: $inner) -> Self {
				Self(value)
			}
		}
	};
}

integer_id!(
	/// Identifier of a deployable application.
	AppId(i32)
);
integer_id!(
	/// Identifier of an environment. [`EnvId::BASE`] addresses the
	/// application's base configuration.
	EnvId(i32)
);
integer_id!(
	/// Identifier of a draft.
	DraftId(i64)
);
integer_id!(
	/// Identifier of a draft version. Strictly increasing within a draft.
	DraftVersionId(i64)
);
integer_id!(CommentId(i64));
integer_id!(UserId(i32));

impl EnvId {
	/// Sentinel for the application's base (default) configuration.
	pub const BASE: EnvId = EnvId(-1);

	pub fn is_base(self) -> bool {
		self == Self::BASE
	}
}
