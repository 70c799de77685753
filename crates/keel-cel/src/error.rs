// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CelError {
	/// Syntax error, undeclared identifier or type mismatch.
	#[error("compile error: {0}")]
	Compile(String),

	#[error("evaluation error: {0}")]
	Evaluation(String),
}

pub type Result<T> = std::result::Result<T, CelError>;
