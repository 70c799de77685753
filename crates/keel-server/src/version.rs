// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build information for keel-server.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Format version info for display.
pub fn format_version_info() -> String {
	format!(
		"keel-server version: {VERSION}\n\
		 Platform:            {}-{}",
		std::env::consts::OS,
		std::env::consts::ARCH,
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn includes_version_and_platform() {
		let info = format_version_info();
		assert!(info.contains(VERSION));
		assert!(info.contains(std::env::consts::OS));
	}
}
