// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A small CEL evaluator used to classify a draft's environment.
//!
//! Supports the subset lock rules need: boolean comparisons on declared
//! parameters, `startsWith`/`endsWith`/`contains` on strings, integer
//! comparisons, list membership with `in`, and `&&`, `||`, `!`.
//!
//! ```
//! use keel_cel::{CelEvaluator, ExpressionParams, ParamName};
//!
//! let params = ExpressionParams::new()
//!     .with_bool(ParamName::IsProdEnv, true)
//!     .unwrap()
//!     .with_int(ParamName::ChartRefId, 15)
//!     .unwrap();
//!
//! let cel = CelEvaluator::new();
//! assert!(cel.evaluate("isProdEnv && chartRefId in [15, 16]", &params).unwrap());
//! assert!(cel.evaluate("IsProdEnv == true", &params).is_err());
//! ```

pub mod ast;
pub mod check;
pub mod error;
pub mod eval;
pub mod params;
pub mod parser;
pub mod program;

pub use error::{CelError, Result};
pub use params::{
	schema_fingerprint, ExpressionParams, ParamName, ParamSchema, ParamType, ParamValue,
};
pub use program::{CelEvaluator, Program, DEFAULT_CACHE_CAPACITY};
