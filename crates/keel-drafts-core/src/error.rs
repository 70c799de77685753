// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
	#[error("invalid {kind} encoding: {value}")]
	InvalidEncoding { kind: &'static str, value: i32 },

	#[error("invalid {kind}: {value}")]
	InvalidName { kind: &'static str, value: String },

	#[error("user id must be positive, got {0}")]
	InvalidUserId(i32),
}

pub type Result<T> = std::result::Result<T, CoreError>;
