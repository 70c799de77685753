// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Draft store database section.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_URL: &str = "sqlite:./keel.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DatabaseConfigLayer {
	pub url: Option<String>,
	pub max_connections: Option<u32>,
	/// How long a writer waits for another writer's transaction to finish.
	pub busy_timeout_ms: Option<u64>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.max_connections.is_some() {
			self.max_connections = other.max_connections;
		}
		if other.busy_timeout_ms.is_some() {
			self.busy_timeout_ms = other.busy_timeout_ms;
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		DatabaseConfig {
			url: self.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
			max_connections: self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
			busy_timeout_ms: self.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
	pub url: String,
	pub max_connections: u32,
	pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		DatabaseConfigLayer::default().finalize()
	}
}

impl DatabaseConfig {
	pub fn busy_timeout(&self) -> Duration {
		Duration::from_millis(self.busy_timeout_ms)
	}

	pub fn validate(&self) -> Result<(), String> {
		if !self.url.starts_with("sqlite:") {
			return Err(format!("database.url must be a sqlite: URL, got '{}'", self.url));
		}
		if self.max_connections == 0 {
			return Err("database.max_connections must be greater than zero".to_string());
		}
		if self.busy_timeout_ms == 0 {
			return Err("database.busy_timeout_ms must be greater than zero".to_string());
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = DatabaseConfig::default();
		assert_eq!(config.url, "sqlite:./keel.db");
		assert_eq!(config.max_connections, 8);
		assert_eq!(config.busy_timeout(), Duration::from_secs(5));
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_merge_keeps_unset_fields() {
		let mut layer = DatabaseConfigLayer {
			url: Some("sqlite:/var/lib/keel/drafts.db".to_string()),
			busy_timeout_ms: Some(250),
			..Default::default()
		};
		layer.merge(DatabaseConfigLayer {
			max_connections: Some(2),
			..Default::default()
		});
		let config = layer.finalize();
		assert_eq!(config.url, "sqlite:/var/lib/keel/drafts.db");
		assert_eq!(config.max_connections, 2);
		assert_eq!(config.busy_timeout_ms, 250);
	}

	#[test]
	fn test_rejects_unusable_settings() {
		for layer in [
			DatabaseConfigLayer {
				url: Some("postgres://db/keel".to_string()),
				..Default::default()
			},
			DatabaseConfigLayer {
				max_connections: Some(0),
				..Default::default()
			},
			DatabaseConfigLayer {
				busy_timeout_ms: Some(0),
				..Default::default()
			},
		] {
			assert!(layer.finalize().validate().is_err());
		}
	}
}
