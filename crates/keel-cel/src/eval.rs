// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::ast::{CompareOp, Expr, Literal, LogicalOp};
use crate::error::{CelError, Result};
use crate::params::{ExpressionParams, ParamName, ParamValue};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
	Bool(bool),
	Int(i64),
	String(String),
	List(Vec<Value>),
}

impl Value {
	fn type_name(&self) -> &'static str {
		match self {
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::String(_) => "string",
			Value::List(_) => "list",
		}
	}
}

impl From<&ParamValue> for Value {
	fn from(value: &ParamValue) -> Self {
		match value {
			ParamValue::Bool(b) => Value::Bool(*b),
			ParamValue::Integer(i) => Value::Int(*i),
			ParamValue::String(s) => Value::String(s.clone()),
		}
	}
}

pub fn evaluate(expr: &Expr, params: &ExpressionParams) -> Result<Value> {
	match expr {
		Expr::Literal(Literal::Bool(b)) => Ok(Value::Bool(*b)),
		Expr::Literal(Literal::Int(i)) => Ok(Value::Int(*i)),
		Expr::Literal(Literal::String(s)) => Ok(Value::String(s.clone())),
		Expr::Ident(name) => ParamName::from_identifier(name)
			.and_then(|param| params.get(param))
			.map(Value::from)
			.ok_or_else(|| CelError::Evaluation(format!("no such attribute '{name}'"))),
		Expr::List(items) => items
			.iter()
			.map(|item| evaluate(item, params))
			.collect::<Result<Vec<_>>>()
			.map(Value::List),
		Expr::Not(inner) => Ok(Value::Bool(!as_bool(evaluate(inner, params)?)?)),
		Expr::Negate(inner) => match evaluate(inner, params)? {
			Value::Int(i) => i
				.checked_neg()
				.map(Value::Int)
				.ok_or_else(|| CelError::Evaluation("integer overflow".to_string())),
			other => Err(mismatch("-", &other)),
		},
		Expr::Logical { op, left, right } => {
			let l = as_bool(evaluate(left, params)?)?;
			match (op, l) {
				(LogicalOp::And, false) => Ok(Value::Bool(false)),
				(LogicalOp::Or, true) => Ok(Value::Bool(true)),
				_ => Ok(Value::Bool(as_bool(evaluate(right, params)?)?)),
			}
		}
		Expr::Compare { op, left, right } => {
			let l = evaluate(left, params)?;
			let r = evaluate(right, params)?;
			compare(*op, &l, &r).map(Value::Bool)
		}
		Expr::In { needle, haystack } => {
			let n = evaluate(needle, params)?;
			match evaluate(haystack, params)? {
				Value::List(items) => Ok(Value::Bool(items.contains(&n))),
				other => Err(mismatch("in", &other)),
			}
		}
		Expr::Call {
			receiver,
			method,
			args,
		} => {
			let Value::String(target) = evaluate(receiver, params)? else {
				return Err(CelError::Evaluation(format!("'{method}' requires a string receiver")));
			};
			let [arg] = args.as_slice() else {
				return Err(CelError::Evaluation(format!("'{method}' takes one argument")));
			};
			let Value::String(arg) = evaluate(arg, params)? else {
				return Err(CelError::Evaluation(format!("'{method}' requires a string argument")));
			};
			match method.as_str() {
				"startsWith" => Ok(Value::Bool(target.starts_with(arg.as_str()))),
				"endsWith" => Ok(Value::Bool(target.ends_with(arg.as_str()))),
				"contains" => Ok(Value::Bool(target.contains(arg.as_str()))),
				other => Err(CelError::Evaluation(format!("unsupported method '{other}'"))),
			}
		}
	}
}

fn as_bool(value: Value) -> Result<bool> {
	match value {
		Value::Bool(b) => Ok(b),
		other => Err(mismatch("bool operand", &other)),
	}
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool> {
	if std::mem::discriminant(left) != std::mem::discriminant(right) {
		return Err(CelError::Evaluation(format!(
			"no such overload: {} {op} {}",
			left.type_name(),
			right.type_name()
		)));
	}
	Ok(match op {
		CompareOp::Eq => left == right,
		CompareOp::Ne => left != right,
		CompareOp::Lt => left < right,
		CompareOp::Le => left <= right,
		CompareOp::Gt => left > right,
		CompareOp::Ge => left >= right,
	})
}

fn mismatch(context: &str, value: &Value) -> CelError {
	CelError::Evaluation(format!("{context}: unexpected {}", value.type_name()))
}
