// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::{debug, instrument};

use crate::ast::Expr;
use crate::check::check_program;
use crate::error::{CelError, Result};
use crate::eval::{evaluate, Value};
use crate::params::{schema_fingerprint, ExpressionParams, ParamSchema};
use crate::parser::ExprParser;

pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// A parsed and type-checked expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
	source: String,
	expr: Expr,
	schema: ParamSchema,
}

impl Program {
	pub fn compile(source: &str, schema: &ParamSchema) -> Result<Self> {
		let expr = ExprParser::parse(source)?;
		check_program(&expr, schema)?;
		Ok(Self {
			source: source.to_string(),
			expr,
			schema: schema.clone(),
		})
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn eval(&self, params: &ExpressionParams) -> Result<bool> {
		match evaluate(&self.expr, params)? {
			Value::Bool(b) => Ok(b),
			other => Err(CelError::Evaluation(format!(
				"expected bool result, got {other:?}"
			))),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
	source: String,
	fingerprint: String,
}

/// Compiles and evaluates expressions, caching compiled programs by
/// (expression text, parameter schema).
///
/// Evaluation holds no state beyond the cache, so one evaluator can be shared
/// across tasks.
#[derive(Debug)]
pub struct CelEvaluator {
	cache: Mutex<LruCache<CacheKey, Arc<Program>>>,
}

impl Default for CelEvaluator {
	fn default() -> Self {
		Self::new()
	}
}

impl CelEvaluator {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_CACHE_CAPACITY)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
		Self {
			cache: Mutex::new(LruCache::new(capacity)),
		}
	}

	/// Evaluates `expression` against `params`.
	#[instrument(skip(self, params), fields(params = params.len()))]
	pub fn evaluate(&self, expression: &str, params: &ExpressionParams) -> Result<bool> {
		let program = self.compile(expression, &params.schema())?;
		program.eval(params)
	}

	/// Compiles `expression` for `schema`, reusing a cached program when one
	/// exists.
	pub fn compile(&self, expression: &str, schema: &ParamSchema) -> Result<Arc<Program>> {
		let key = CacheKey {
			source: expression.trim().to_string(),
			fingerprint: schema_fingerprint(schema),
		};

		if let Some(program) = self.lock_cache()?.get(&key) {
			debug!(expression = %key.source, "cel program cache hit");
			return Ok(Arc::clone(program));
		}

		debug!(expression = %key.source, schema = %key.fingerprint, "compiling cel program");
		let program = Arc::new(Program::compile(&key.source, schema)?);
		self.lock_cache()?.push(key, Arc::clone(&program));
		Ok(program)
	}

	/// Compiles every expression up front so broken ones surface at load time.
	pub fn precompile<'a>(
		&self,
		expressions: impl IntoIterator<Item = &'a str>,
		schema: &ParamSchema,
	) -> Result<()> {
		for expression in expressions {
			self.compile(expression, schema)?;
		}
		Ok(())
	}

	pub fn cached_programs(&self) -> usize {
		self.cache.lock().map(|c| c.len()).unwrap_or(0)
	}

	fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, LruCache<CacheKey, Arc<Program>>>> {
		self.cache
			.lock()
			.map_err(|_| CelError::Evaluation("program cache poisoned".to_string()))
	}
}
