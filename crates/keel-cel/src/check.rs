// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Static type checking against a parameter schema.

use std::fmt;

use crate::ast::{CompareOp, Expr, Literal};
use crate::error::{CelError, Result};
use crate::params::{ParamName, ParamSchema, ParamType};

/// String methods callable on a string receiver with one string argument.
pub const STRING_METHODS: &[&str] = &["startsWith", "endsWith", "contains"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
	Bool,
	Int,
	String,
	List(Box<Type>),
	/// Element type of an empty list literal; unifies with anything.
	Dyn,
}

impl Type {
	fn unify(&self, other: &Type) -> Option<Type> {
		match (self, other) {
			(Type::Dyn, t) | (t, Type::Dyn) => Some(t.clone()),
			(Type::List(a), Type::List(b)) => a.unify(b).map(|t| Type::List(Box::new(t))),
			(a, b) if a == b => Some(a.clone()),
			_ => None,
		}
	}
}

impl From<ParamType> for Type {
	fn from(value: ParamType) -> Self {
		match value {
			ParamType::Bool => Type::Bool,
			ParamType::Integer => Type::Int,
			ParamType::String => Type::String,
		}
	}
}

impl fmt::Display for Type {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Type::Bool => f.write_str("bool"),
			Type::Int => f.write_str("int"),
			Type::String => f.write_str("string"),
			Type::List(inner) => write!(f, "list({inner})"),
			Type::Dyn => f.write_str("dyn"),
		}
	}
}

/// Checks that `expr` is a boolean expression over declared parameters.
pub fn check_program(expr: &Expr, schema: &ParamSchema) -> Result<()> {
	match check(expr, schema)? {
		Type::Bool => Ok(()),
		other => Err(CelError::Compile(format!(
			"expression must evaluate to bool, found {other}"
		))),
	}
}

pub fn check(expr: &Expr, schema: &ParamSchema) -> Result<Type> {
	match expr {
		Expr::Literal(Literal::Bool(_)) => Ok(Type::Bool),
		Expr::Literal(Literal::Int(_)) => Ok(Type::Int),
		Expr::Literal(Literal::String(_)) => Ok(Type::String),
		Expr::Ident(name) => ParamName::from_identifier(name)
			.and_then(|param| schema.get(&param))
			.map(|ty| Type::from(*ty))
			.ok_or_else(|| CelError::Compile(format!("undeclared reference to '{name}'"))),
		Expr::List(items) => {
			let mut element = Type::Dyn;
			for item in items {
				let ty = check(item, schema)?;
				element = element.unify(&ty).ok_or_else(|| {
					CelError::Compile(format!("list mixes {element} and {ty} elements"))
				})?;
			}
			Ok(Type::List(Box::new(element)))
		}
		Expr::Not(inner) => {
			expect(inner, schema, Type::Bool, "!")?;
			Ok(Type::Bool)
		}
		Expr::Negate(inner) => {
			expect(inner, schema, Type::Int, "-")?;
			Ok(Type::Int)
		}
		Expr::Logical { left, right, .. } => {
			expect(left, schema, Type::Bool, "logical operator")?;
			expect(right, schema, Type::Bool, "logical operator")?;
			Ok(Type::Bool)
		}
		Expr::Compare { op, left, right } => {
			let l = check(left, schema)?;
			let r = check(right, schema)?;
			let unified = l.unify(&r).ok_or_else(|| no_overload(&op.to_string(), &l, &r))?;
			let ordered = matches!(op, CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge);
			if ordered && !matches!(unified, Type::Int | Type::String) {
				return Err(no_overload(&op.to_string(), &l, &r));
			}
			Ok(Type::Bool)
		}
		Expr::In { needle, haystack } => {
			let n = check(needle, schema)?;
			let h = check(haystack, schema)?;
			match &h {
				Type::List(element) if element.unify(&n).is_some() => Ok(Type::Bool),
				_ => Err(no_overload("in", &n, &h)),
			}
		}
		Expr::Call {
			receiver,
			method,
			args,
		} => {
			if !STRING_METHODS.contains(&method.as_str()) {
				return Err(CelError::Compile(format!("unsupported method '{method}'")));
			}
			expect(receiver, schema, Type::String, method)?;
			let [arg] = args.as_slice() else {
				return Err(CelError::Compile(format!(
					"'{method}' takes exactly one argument, got {}",
					args.len()
				)));
			};
			expect(arg, schema, Type::String, method)?;
			Ok(Type::Bool)
		}
	}
}

fn expect(expr: &Expr, schema: &ParamSchema, wanted: Type, context: &str) -> Result<()> {
	let ty = check(expr, schema)?;
	if ty.unify(&wanted).is_some() {
		Ok(())
	} else {
		Err(CelError::Compile(format!(
			"'{context}' expects {wanted}, found {ty}"
		)))
	}
}

fn no_overload(op: &str, left: &Type, right: &Type) -> CelError {
	CelError::Compile(format!("found no matching overload for '{op}' applied to ({left}, {right})"))
}
