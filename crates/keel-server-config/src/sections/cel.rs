// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Expression evaluator configuration section.

use serde::Deserialize;

const DEFAULT_CACHE_CAPACITY: usize = 512;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CelConfigLayer {
	pub cache_capacity: Option<usize>,
}

impl CelConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.cache_capacity.is_some() {
			self.cache_capacity = other.cache_capacity;
		}
	}

	pub fn finalize(self) -> CelConfig {
		CelConfig {
			cache_capacity: self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct CelConfig {
	pub cache_capacity: usize,
}

impl Default for CelConfig {
	fn default() -> Self {
		CelConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_capacity() {
		assert_eq!(CelConfig::default().cache_capacity, 512);
	}

	#[test]
	fn test_merge_keeps_base_when_unset() {
		let mut base = CelConfigLayer {
			cache_capacity: Some(64),
		};
		base.merge(CelConfigLayer::default());
		assert_eq!(base.finalize().cache_capacity, 64);
	}
}
